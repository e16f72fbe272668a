//! Decoder for SDMX-ML 2.0 and 2.1 structure messages.
//!
//! Code lists and concepts may appear before or after the structures that
//! reference them, so the document is read once into raw parts and the
//! domain values are assembled at the end.

use std::collections::HashMap;
use std::io::BufRead;

use crate::domain::{
    DataStructure, Dataflow, Dimension, FlowRef, Languages, StructureRef,
};
use crate::xml::probe::{probe_root, SchemaVersion};
use crate::xml::stream::{attr, Tok, XmlStream};
use crate::SdmxError;

/// Structures and flows found in one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructureDocument {
    pub structures: Vec<DataStructure>,
    pub flows: Vec<Dataflow>,
}

type Localized = Vec<(String, String)>;

#[derive(Debug, Default)]
struct Names {
    names: Localized,
    descriptions: Localized,
}

impl Names {
    fn push(&mut self, element: &str, lang: String, text: String) {
        if element == "Name" {
            self.names.push((lang, text));
        } else {
            self.descriptions.push((lang, text));
        }
    }

    fn select(&self, languages: &Languages) -> Option<String> {
        languages
            .select(&self.names)
            .or_else(|| languages.select(&self.descriptions))
            .map(str::to_owned)
    }
}

#[derive(Debug, Default)]
struct RawDimension {
    id: String,
    position: Option<usize>,
    concept: Option<String>,
    codelist: Option<String>,
}

#[derive(Debug, Default)]
struct RawStructure {
    agency: String,
    id: String,
    version: String,
    names: Names,
    dimensions: Vec<RawDimension>,
    time_dimension: Option<String>,
    primary_measure: Option<String>,
}

#[derive(Debug, Default)]
struct RawFlow {
    agency: String,
    id: String,
    version: String,
    names: Names,
    structure: (String, String, String),
}

#[derive(Debug, Default)]
struct RawCode {
    id: String,
    names: Names,
}

#[derive(Debug)]
struct Decoder {
    version: SchemaVersion,
    path: Vec<String>,
    codelists: HashMap<String, Vec<RawCode>>,
    current_codelist: Option<String>,
    concepts: HashMap<String, Names>,
    current_concept: Option<String>,
    structures: Vec<RawStructure>,
    flows: Vec<RawFlow>,
}

/// Decodes every data structure and dataflow of a structure message.
///
/// The schema version is taken from the root namespace.
pub fn decode_structures<R: BufRead>(
    source: R,
    languages: &Languages,
) -> Result<StructureDocument, SdmxError> {
    let mut stream = XmlStream::new(source);
    let root = probe_root(&mut stream)?;
    if root.name != "Structure" {
        return Err(SdmxError::io(format!(
            "expected a structure message, found '{}'",
            root.name
        )));
    }
    if root.version == SchemaVersion::V10 {
        return Err(SdmxError::io("SDMX-ML 1.0 structures are not supported"));
    }

    let mut decoder = Decoder {
        version: root.version,
        path: vec![root.name],
        codelists: HashMap::new(),
        current_codelist: None,
        concepts: HashMap::new(),
        current_concept: None,
        structures: Vec::new(),
        flows: Vec::new(),
    };
    decoder.read(&mut stream)?;
    decoder.assemble(languages)
}

impl Decoder {
    fn id_attr(&self) -> &'static str {
        match self.version {
            SchemaVersion::V21 => "id",
            _ => "conceptRef",
        }
    }

    fn parent(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    fn within(&self, name: &str) -> bool {
        self.path.iter().any(|element| element == name)
    }

    fn within_structure(&self) -> bool {
        self.within("DataStructure") || self.within("KeyFamily")
    }

    /// True when the next element declares a component rather than referencing one.
    ///
    /// `AttributeRelationship` and group sections also contain `Dimension` and
    /// `PrimaryMeasure` elements, but those only carry a `Ref`.
    fn declares_component(&self) -> bool {
        self.within_structure()
            && matches!(self.parent(), "DimensionList" | "MeasureList" | "Components")
    }

    fn read<R: BufRead>(&mut self, stream: &mut XmlStream<R>) -> Result<(), SdmxError> {
        loop {
            match stream.next()? {
                Tok::Start { name, attrs, .. } => {
                    if self.start(stream, &name, &attrs)? {
                        self.path.push(name);
                    }
                }
                Tok::End { name } => {
                    self.end(&name);
                    self.path.pop();
                }
                Tok::Text(_) => {}
                Tok::Eof => return Ok(()),
            }
        }
    }

    /// Handles one start tag; returns `false` when the element was consumed.
    fn start<R: BufRead>(
        &mut self,
        stream: &mut XmlStream<R>,
        name: &str,
        attrs: &[(String, String)],
    ) -> Result<bool, SdmxError> {
        let owned = |key: &str| attr(attrs, key).unwrap_or_default().to_owned();

        match name {
            "Header" => {
                stream.skip_element()?;
                return Ok(false);
            }
            "Name" | "Description" => {
                let lang = owned("lang");
                let text = stream.read_text()?;
                self.localized(name, lang, text);
                return Ok(false);
            }
            "KeyFamilyID" | "KeyFamilyAgencyID" | "Version" if self.parent() == "KeyFamilyRef" => {
                let text = stream.read_text()?.trim().to_owned();
                if let Some(flow) = self.flows.last_mut() {
                    match name {
                        "KeyFamilyID" => flow.structure.1 = text,
                        "KeyFamilyAgencyID" => flow.structure.0 = text,
                        _ => flow.structure.2 = text,
                    }
                }
                return Ok(false);
            }
            "Codelist" | "CodeList" => {
                let id = owned("id");
                self.codelists.entry(id.clone()).or_default();
                self.current_codelist = Some(id);
            }
            "Code" => {
                let id = match self.version {
                    SchemaVersion::V21 => owned("id"),
                    _ => owned("value"),
                };
                if let Some(codes) = self
                    .current_codelist
                    .as_ref()
                    .and_then(|codelist| self.codelists.get_mut(codelist))
                {
                    codes.push(RawCode {
                        id,
                        names: Names::default(),
                    });
                }
            }
            "Concept" => {
                let id = owned("id");
                self.concepts.entry(id.clone()).or_default();
                self.current_concept = Some(id);
            }
            "DataStructure" | "KeyFamily" => self.structures.push(RawStructure {
                agency: owned("agencyID"),
                id: owned("id"),
                version: owned("version"),
                ..RawStructure::default()
            }),
            "Dimension" if self.declares_component() => {
                let id = owned(self.id_attr());
                let position = attr(attrs, "position").and_then(|value| value.parse().ok());
                let codelist = attr(attrs, "codelist").map(str::to_owned);
                let concept = match self.version {
                    SchemaVersion::V21 => None,
                    _ => Some(id.clone()),
                };
                if let Some(structure) = self.structures.last_mut() {
                    structure.dimensions.push(RawDimension {
                        id,
                        position,
                        concept,
                        codelist,
                    });
                }
            }
            "TimeDimension" if self.declares_component() => {
                let id = owned(self.id_attr());
                if let Some(structure) = self.structures.last_mut() {
                    structure.time_dimension = Some(id);
                }
            }
            "PrimaryMeasure" if self.declares_component() => {
                let id = owned(self.id_attr());
                if let Some(structure) = self.structures.last_mut() {
                    structure.primary_measure = Some(id);
                }
            }
            "Dataflow" => self.flows.push(RawFlow {
                agency: owned("agencyID"),
                id: owned("id"),
                version: owned("version"),
                ..RawFlow::default()
            }),
            "Ref" => self.reference(attrs),
            _ => {}
        }
        Ok(true)
    }

    fn end(&mut self, name: &str) {
        match name {
            "Codelist" | "CodeList" => self.current_codelist = None,
            "Concept" => self.current_concept = None,
            _ => {}
        }
    }

    fn reference(&mut self, attrs: &[(String, String)]) {
        let owned = |key: &str| attr(attrs, key).unwrap_or_default().to_owned();
        let in_dimension = self.within("DimensionList") && self.within("Dimension");
        let parent = self.parent().to_owned();

        match parent.as_str() {
            "ConceptIdentity" if in_dimension => {
                if let Some(dimension) = self.last_dimension() {
                    dimension.concept = Some(owned("id"));
                }
            }
            "Enumeration" if in_dimension => {
                if let Some(dimension) = self.last_dimension() {
                    dimension.codelist = Some(owned("id"));
                }
            }
            "Structure" if self.within("Dataflow") => {
                if let Some(flow) = self.flows.last_mut() {
                    flow.structure = (owned("agencyID"), owned("id"), owned("version"));
                }
            }
            _ => {}
        }
    }

    fn last_dimension(&mut self) -> Option<&mut RawDimension> {
        self.structures
            .last_mut()
            .and_then(|structure| structure.dimensions.last_mut())
    }

    fn localized(&mut self, element: &str, lang: String, text: String) {
        let text = text.trim().to_owned();
        let parent = self.parent().to_owned();
        match parent.as_str() {
            "Code" => {
                if let Some(code) = self
                    .current_codelist
                    .as_ref()
                    .and_then(|codelist| self.codelists.get_mut(codelist))
                    .and_then(|codes| codes.last_mut())
                {
                    code.names.push(element, lang, text);
                }
            }
            "Concept" => {
                if let Some(names) = self
                    .current_concept
                    .as_ref()
                    .and_then(|concept| self.concepts.get_mut(concept))
                {
                    names.push(element, lang, text);
                }
            }
            "DataStructure" | "KeyFamily" => {
                if let Some(structure) = self.structures.last_mut() {
                    structure.names.push(element, lang, text);
                }
            }
            "Dataflow" => {
                if let Some(flow) = self.flows.last_mut() {
                    flow.names.push(element, lang, text);
                }
            }
            _ => {}
        }
    }

    fn assemble(self, languages: &Languages) -> Result<StructureDocument, SdmxError> {
        let mut document = StructureDocument::default();

        for raw in self.structures {
            let structure_ref = StructureRef::of(&raw.agency, &raw.id, &raw.version)?;
            let mut dimensions = raw.dimensions;
            // 2.1 positions also count the time dimension; keep the order only
            dimensions.sort_by_key(|dimension| dimension.position.unwrap_or(usize::MAX));

            let mut builder = DataStructure::builder()
                .structure_ref(structure_ref)
                .label(raw.names.select(languages).unwrap_or_else(|| raw.id.clone()));
            for (index, dimension) in dimensions.into_iter().enumerate() {
                let label = dimension
                    .concept
                    .as_ref()
                    .and_then(|concept| self.concepts.get(concept))
                    .and_then(|names| names.select(languages))
                    .unwrap_or_else(|| dimension.id.clone());
                let codes = dimension
                    .codelist
                    .as_ref()
                    .and_then(|codelist| self.codelists.get(codelist))
                    .map(|codes| {
                        codes
                            .iter()
                            .map(|code| {
                                let label = code
                                    .names
                                    .select(languages)
                                    .unwrap_or_else(|| code.id.clone());
                                (code.id.clone(), label)
                            })
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                builder = builder.dimension(
                    Dimension::builder()
                        .id(dimension.id)
                        .position(index + 1)
                        .label(label)
                        .codes(codes)
                        .build()?,
                );
            }
            if let Some(time_dimension) = raw.time_dimension {
                builder = builder.time_dimension_id(time_dimension);
            }
            if let Some(primary_measure) = raw.primary_measure {
                builder = builder.primary_measure_id(primary_measure);
            }
            document.structures.push(builder.build()?);
        }

        for raw in self.flows {
            let (agency, id, version) = &raw.structure;
            let flow = Dataflow::builder()
                .flow_ref(FlowRef::of(&raw.agency, &raw.id, &raw.version)?)
                .structure_ref(StructureRef::of(agency, id, version)?)
                .label(raw.names.select(languages).unwrap_or_else(|| raw.id.clone()))
                .build()?;
            document.flows.push(flow);
        }

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRUCTURE_21: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<mes:Structure xmlns:mes="http://www.sdmx.org/resources/sdmxml/schemas/v2_1/message" xmlns:str="http://www.sdmx.org/resources/sdmxml/schemas/v2_1/structure" xmlns:com="http://www.sdmx.org/resources/sdmxml/schemas/v2_1/common">
  <mes:Header><mes:ID>IREF</mes:ID></mes:Header>
  <mes:Structures>
    <str:Dataflows>
      <str:Dataflow id="EXR" agencyID="ECB" version="1.0">
        <com:Name xml:lang="en">Exchange Rates</com:Name>
        <com:Name xml:lang="fr">Taux de change</com:Name>
        <str:Structure><Ref id="ECB_EXR1" agencyID="ECB" version="1.0" class="DataStructure"/></str:Structure>
      </str:Dataflow>
    </str:Dataflows>
    <str:Codelists>
      <str:Codelist id="CL_FREQ" agencyID="ECB" version="1.0">
        <com:Name xml:lang="en">Frequency</com:Name>
        <str:Code id="A"><com:Name xml:lang="en">Annual</com:Name></str:Code>
        <str:Code id="M"><com:Name xml:lang="en">Monthly</com:Name></str:Code>
      </str:Codelist>
    </str:Codelists>
    <str:Concepts>
      <str:ConceptScheme id="ECB_CONCEPTS" agencyID="ECB" version="1.0">
        <str:Concept id="FREQ"><com:Name xml:lang="en">Frequency</com:Name></str:Concept>
      </str:ConceptScheme>
    </str:Concepts>
    <str:DataStructures>
      <str:DataStructure id="ECB_EXR1" agencyID="ECB" version="1.0">
        <com:Name xml:lang="en">Exchange Rates</com:Name>
        <str:DataStructureComponents>
          <str:DimensionList id="DimensionDescriptor">
            <str:Dimension id="CURRENCY" position="2">
              <str:ConceptIdentity><Ref id="CURRENCY"/></str:ConceptIdentity>
            </str:Dimension>
            <str:Dimension id="FREQ" position="1">
              <str:ConceptIdentity><Ref id="FREQ" maintainableParentID="ECB_CONCEPTS"/></str:ConceptIdentity>
              <str:LocalRepresentation><str:Enumeration><Ref id="CL_FREQ" agencyID="ECB" version="1.0"/></str:Enumeration></str:LocalRepresentation>
            </str:Dimension>
            <str:TimeDimension id="TIME_PERIOD" position="3"/>
          </str:DimensionList>
          <str:MeasureList id="MeasureDescriptor">
            <str:PrimaryMeasure id="OBS_VALUE"/>
          </str:MeasureList>
        </str:DataStructureComponents>
      </str:DataStructure>
    </str:DataStructures>
  </mes:Structures>
</mes:Structure>"#;

    const STRUCTURE_20: &str = r#"<message:Structure xmlns:message="http://www.SDMX.org/resources/SDMXML/schemas/v2_0/message" xmlns:structure="http://www.SDMX.org/resources/SDMXML/schemas/v2_0/structure">
  <message:Header><message:ID>S</message:ID></message:Header>
  <message:Dataflows>
    <structure:Dataflow id="TEST_DATASET" agencyID="NBB" version="1.0">
      <structure:Name xml:lang="en">Test dataset</structure:Name>
      <structure:KeyFamilyRef>
        <structure:KeyFamilyID>TEST_DSD</structure:KeyFamilyID>
        <structure:KeyFamilyAgencyID>NBB</structure:KeyFamilyAgencyID>
      </structure:KeyFamilyRef>
    </structure:Dataflow>
  </message:Dataflows>
  <message:CodeLists>
    <structure:CodeList id="CL_AREA" agencyID="NBB">
      <structure:Name xml:lang="en">Area</structure:Name>
      <structure:Code value="BE"><structure:Description xml:lang="en">Belgium</structure:Description></structure:Code>
    </structure:CodeList>
  </message:CodeLists>
  <message:Concepts>
    <structure:Concept id="REF_AREA"><structure:Name xml:lang="en">Reference area</structure:Name></structure:Concept>
  </message:Concepts>
  <message:KeyFamilies>
    <structure:KeyFamily id="TEST_DSD" agencyID="NBB" version="1.0">
      <structure:Name xml:lang="en">Test structure</structure:Name>
      <structure:Components>
        <structure:Dimension conceptRef="REF_AREA" codelist="CL_AREA"/>
        <structure:TimeDimension conceptRef="TIME"/>
        <structure:PrimaryMeasure conceptRef="VALUE"/>
      </structure:Components>
    </structure:KeyFamily>
  </message:KeyFamilies>
</message:Structure>"#;

    #[test]
    fn decodes_21_structures_and_flows() {
        let languages = Languages::parse("fr,en").expect("valid");
        let document = decode_structures(STRUCTURE_21.as_bytes(), &languages).expect("decode");

        assert_eq!(document.flows.len(), 1);
        let flow = &document.flows[0];
        assert_eq!(flow.flow_ref().to_string(), "ECB,EXR,1.0");
        assert_eq!(flow.structure_ref().to_string(), "ECB,ECB_EXR1,1.0");
        assert_eq!(flow.label(), "Taux de change");

        let structure = &document.structures[0];
        assert_eq!(structure.dimension_ids(), vec!["FREQ", "CURRENCY"]);
        let freq = structure.dimension("FREQ").expect("freq");
        assert_eq!(freq.position(), 1);
        assert_eq!(freq.label(), "Frequency");
        assert_eq!(freq.code_label("M"), Some("Monthly"));
        assert_eq!(structure.dimension("CURRENCY").expect("ccy").label(), "CURRENCY");
        assert_eq!(structure.time_dimension_id(), "TIME_PERIOD");
        assert_eq!(structure.primary_measure_id(), "OBS_VALUE");
    }

    const EXR_FIXTURE: &str = include_str!("../../../../tests/fixtures/ecb_exr_structure21.xml");

    const STRUCTURE_21_ATTRIBUTES: &str = r#"<mes:Structure xmlns:mes="http://www.sdmx.org/resources/sdmxml/schemas/v2_1/message" xmlns:str="http://www.sdmx.org/resources/sdmxml/schemas/v2_1/structure" xmlns:com="http://www.sdmx.org/resources/sdmxml/schemas/v2_1/common">
  <mes:Structures>
    <str:DataStructures>
      <str:DataStructure id="DSD" agencyID="TEST" version="1.0">
        <str:DataStructureComponents>
          <str:DimensionList id="DimensionDescriptor">
            <str:Dimension id="FREQ" position="1">
              <str:ConceptIdentity><Ref id="FREQ"/></str:ConceptIdentity>
            </str:Dimension>
            <str:TimeDimension id="TIME_PERIOD" position="2"/>
          </str:DimensionList>
          <str:MeasureList id="MeasureDescriptor">
            <str:PrimaryMeasure id="OBS_VALUE"/>
          </str:MeasureList>
          <str:AttributeList id="AttributeDescriptor">
            <str:Attribute id="OBS_STATUS" assignmentStatus="Mandatory">
              <str:ConceptIdentity><Ref id="OBS_STATUS"/></str:ConceptIdentity>
              <str:LocalRepresentation><str:Enumeration><Ref id="CL_OBS_STATUS"/></str:Enumeration></str:LocalRepresentation>
              <str:AttributeRelationship>
                <str:Dimension><Ref id="FREQ"/></str:Dimension>
                <str:PrimaryMeasure><Ref id="OBS_VALUE"/></str:PrimaryMeasure>
              </str:AttributeRelationship>
            </str:Attribute>
          </str:AttributeList>
        </str:DataStructureComponents>
      </str:DataStructure>
    </str:DataStructures>
  </mes:Structures>
</mes:Structure>"#;

    #[test]
    fn attribute_relationships_do_not_declare_components() {
        let document =
            decode_structures(STRUCTURE_21_ATTRIBUTES.as_bytes(), &Languages::any()).expect("decode");

        let structure = &document.structures[0];
        assert_eq!(structure.dimension_ids(), vec!["FREQ"]);
        let freq = structure.dimension("FREQ").expect("freq");
        assert_eq!(freq.label(), "FREQ");
        assert!(freq.codes().is_empty());
        assert_eq!(structure.time_dimension_id(), "TIME_PERIOD");
        assert_eq!(structure.primary_measure_id(), "OBS_VALUE");
    }

    #[test]
    fn decodes_full_dsd_with_groups_and_attributes() {
        let document = decode_structures(EXR_FIXTURE.as_bytes(), &Languages::any()).expect("decode");

        let structure = &document.structures[0];
        assert_eq!(structure.dimension_ids(), vec!["FREQ", "CURRENCY"]);
        let positions: Vec<usize> = structure.dimensions().iter().map(|d| d.position()).collect();
        assert_eq!(positions, vec![1, 2]);

        let currency = structure.dimension("CURRENCY").expect("currency");
        assert_eq!(currency.label(), "Currency");
        let codes: Vec<&str> = currency.codes().iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(codes, vec!["JPY", "USD"]);
        assert_eq!(structure.time_dimension_id(), "TIME_PERIOD");
        assert_eq!(structure.primary_measure_id(), "OBS_VALUE");
    }

    #[test]
    fn decodes_20_key_families() {
        let document = decode_structures(STRUCTURE_20.as_bytes(), &Languages::any()).expect("decode");

        let flow = &document.flows[0];
        assert_eq!(flow.flow_ref().to_string(), "NBB,TEST_DATASET,1.0");
        assert_eq!(flow.structure_ref().to_string(), "NBB,TEST_DSD,latest");

        let structure = &document.structures[0];
        let area = structure.dimension("REF_AREA").expect("area");
        assert_eq!(area.label(), "Reference area");
        assert_eq!(area.code_label("BE"), Some("Belgium"));
        assert_eq!(structure.time_dimension_id(), "TIME");
        assert_eq!(structure.primary_measure_id(), "VALUE");
    }

    #[test]
    fn rejects_data_messages() {
        let xml = r#"<m:GenericData xmlns:m="http://www.sdmx.org/resources/sdmxml/schemas/v2_1/message"/>"#;
        assert!(decode_structures(xml.as_bytes(), &Languages::any()).is_err());
    }
}
