use crate::ValidationError;

/// Percent-encoding URL builder.
///
/// Path segments and query parameters are encoded one by one, so `/`, `&`
/// and `=` inside a value never act as separators. Output follows append
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestQueryBuilder {
    endpoint: String,
    segments: Vec<String>,
    params: Vec<(String, String)>,
}

impl RestQueryBuilder {
    /// Starts from an absolute `http(s)` endpoint; a trailing `/` is dropped.
    pub fn of(endpoint: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidUrl {
            value: endpoint.to_owned(),
            reason,
        };
        let url = reqwest::Url::parse(endpoint.trim()).map_err(|error| invalid(error.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }
        if url.query().is_some() {
            return Err(invalid(String::from("endpoint cannot carry a query")));
        }

        Ok(Self {
            endpoint: endpoint.trim().trim_end_matches('/').to_owned(),
            segments: Vec::new(),
            params: Vec::new(),
        })
    }

    pub fn path(mut self, segment: impl AsRef<str>) -> Self {
        self.segments
            .push(urlencoding::encode(segment.as_ref()).into_owned());
        self
    }

    pub fn param(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.params.push((
            urlencoding::encode(key.as_ref()).into_owned(),
            urlencoding::encode(value.as_ref()).into_owned(),
        ));
        self
    }

    pub fn build(&self) -> String {
        let mut url = self.endpoint.clone();
        for segment in &self.segments {
            url.push('/');
            url.push_str(segment);
        }
        for (index, (key, value)) in self.params.iter().enumerate() {
            url.push(if index == 0 { '?' } else { '&' });
            url.push_str(key);
            url.push('=');
            url.push_str(value);
        }
        url
    }
}
