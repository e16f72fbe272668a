use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Canonical observation frequency shared by every dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Annual,
    HalfYearly,
    Quarterly,
    Monthly,
    Weekly,
    Daily,
    DailyBusiness,
    Hourly,
    Minutely,
    #[default]
    Undefined,
}

impl Frequency {
    pub const ALL: [Self; 10] = [
        Self::Annual,
        Self::HalfYearly,
        Self::Quarterly,
        Self::Monthly,
        Self::Weekly,
        Self::Daily,
        Self::DailyBusiness,
        Self::Hourly,
        Self::Minutely,
        Self::Undefined,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Annual => "ANNUAL",
            Self::HalfYearly => "HALF_YEARLY",
            Self::Quarterly => "QUARTERLY",
            Self::Monthly => "MONTHLY",
            Self::Weekly => "WEEKLY",
            Self::Daily => "DAILY",
            Self::DailyBusiness => "DAILY_BUSINESS",
            Self::Hourly => "HOURLY",
            Self::Minutely => "MINUTELY",
            Self::Undefined => "UNDEFINED",
        }
    }

    /// Single-letter SDMX code list value, if the frequency has one.
    pub const fn code(self) -> Option<char> {
        match self {
            Self::Annual => Some('A'),
            Self::HalfYearly => Some('S'),
            Self::Quarterly => Some('Q'),
            Self::Monthly => Some('M'),
            Self::Weekly => Some('W'),
            Self::Daily => Some('D'),
            Self::DailyBusiness => Some('B'),
            Self::Hourly => Some('H'),
            Self::Minutely => Some('N'),
            Self::Undefined => None,
        }
    }

    pub const fn from_code(code: char) -> Self {
        match code {
            'A' => Self::Annual,
            'S' => Self::HalfYearly,
            'Q' => Self::Quarterly,
            'M' => Self::Monthly,
            'W' => Self::Weekly,
            'D' => Self::Daily,
            'B' => Self::DailyBusiness,
            'H' => Self::Hourly,
            'N' => Self::Minutely,
            _ => Self::Undefined,
        }
    }
}

impl Display for Frequency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for freq in Frequency::ALL {
            if let Some(code) = freq.code() {
                assert_eq!(Frequency::from_code(code), freq);
            }
        }
        assert_eq!(Frequency::from_code('X'), Frequency::Undefined);
    }
}
