use std::fs;
use std::sync::Arc;

use sdmx_core::xml::XmlDataCursor;
use sdmx_core::{
    collect_series, decode_structures, with_cursor, Connection, DataDetail, FileDriver, FlowRef,
    HttpResponse, Key, Languages, MemDriver, Repository, RetryConfig, SdmxErrorKind, SdmxManager,
    SdmxSource, StaticHttpClient, WebDriver,
};

const EXR_STRUCTURE: &str = include_str!("../fixtures/ecb_exr_structure21.xml");
const EXR_COMPACT: &str = include_str!("../fixtures/ecb_exr_compact21.xml");

const ENDPOINT: &str = "https://sdmx.example.org/rest";

struct DriverCase {
    driver: &'static str,
    connection: Box<dyn Connection>,
    flow: FlowRef,
    _files: Option<tempfile::TempDir>,
}

fn mem_case() -> DriverCase {
    let document =
        decode_structures(EXR_STRUCTURE.as_bytes(), &Languages::any()).expect("structure decodes");
    let structure = document.structures[0].clone();
    let flow = document.flows[0].flow_ref().clone();
    let series = with_cursor(
        XmlDataCursor::compact_data_21(EXR_COMPACT.as_bytes(), &structure),
        |cursor| collect_series(cursor),
    )
    .expect("data decodes");
    let repository = Repository::builder()
        .name("EXR")
        .structures(document.structures)
        .flows(document.flows)
        .data(flow.clone(), series)
        .series_keys_only_supported(true)
        .build()
        .expect("valid repository");

    let manager = SdmxManager::builder()
        .with_driver(Arc::new(MemDriver::new([repository])))
        .build()
        .expect("manager builds");
    DriverCase {
        driver: "mem",
        connection: manager.get_connection("EXR").expect("mem connection"),
        flow,
        _files: None,
    }
}

fn file_case() -> DriverCase {
    let dir = tempfile::tempdir().expect("temp dir");
    let data = dir.path().join("exr.xml");
    let structure = dir.path().join("exr_structure.xml");
    fs::write(&data, EXR_COMPACT).expect("write data");
    fs::write(&structure, EXR_STRUCTURE).expect("write structure");

    let manager = SdmxManager::builder()
        .with_driver(Arc::new(FileDriver::new()))
        .build()
        .expect("manager builds");
    let uri = format!(
        "sdmx:file:?data={}&structure={}",
        data.display(),
        structure.display()
    );
    DriverCase {
        driver: "file",
        connection: manager.get_connection_by_uri(&uri).expect("file connection"),
        flow: FlowRef::parse("ECB,exr,1.0").expect("valid ref"),
        _files: Some(dir),
    }
}

fn keys_only_body() -> String {
    EXR_COMPACT
        .lines()
        .filter(|line| !line.contains("<Obs "))
        .collect::<Vec<_>>()
        .join("\n")
}

fn web_case() -> DriverCase {
    let http = StaticHttpClient::new()
        .respond(
            format!("{ENDPOINT}/dataflow/all/all/latest"),
            HttpResponse::ok(EXR_STRUCTURE),
        )
        .respond(
            format!("{ENDPOINT}/dataflow/ECB/EXR/1.0"),
            HttpResponse::ok(EXR_STRUCTURE),
        )
        .respond(
            format!("{ENDPOINT}/datastructure/ECB/ECB_EXR1/1.0?references=children"),
            HttpResponse::ok(EXR_STRUCTURE),
        )
        .respond(
            format!("{ENDPOINT}/data/ECB%2CEXR%2C1.0/all/all?detail=full"),
            HttpResponse::ok(EXR_COMPACT),
        )
        .respond(
            format!("{ENDPOINT}/data/ECB%2CEXR%2C1.0/all/all?detail=serieskeysonly"),
            HttpResponse::ok(keys_only_body()),
        );
    let source = SdmxSource::builder()
        .name("EXR")
        .driver("web")
        .endpoint(ENDPOINT)
        .build()
        .expect("valid source");

    let manager = SdmxManager::builder()
        .with_driver(Arc::new(WebDriver::new()))
        .with_source(source)
        .with_http_client(Arc::new(http))
        .with_retry(RetryConfig::no_retry())
        .build()
        .expect("manager builds");
    DriverCase {
        driver: "web",
        connection: manager.get_connection("EXR").expect("web connection"),
        flow: FlowRef::parse("ECB,EXR,1.0").expect("valid ref"),
        _files: None,
    }
}

fn driver_cases() -> Vec<DriverCase> {
    vec![mem_case(), file_case(), web_case()]
}

#[test]
fn flows_include_the_exchange_rate_flow_for_all_drivers() {
    for case in driver_cases() {
        let flows = case
            .connection
            .flows()
            .unwrap_or_else(|error| panic!("driver '{}' flows failed: {error}", case.driver));
        assert!(
            flows.iter().any(|flow| flow.flow_ref() == &case.flow),
            "driver '{}': flow listed",
            case.driver
        );

        let flow = case.connection.flow(&case.flow).expect("flow lookup");
        assert_eq!(
            flow.structure_ref().to_string(),
            "ECB,ECB_EXR1,1.0",
            "driver '{}': structure ref",
            case.driver
        );
    }
}

#[test]
fn structure_exposes_dimensions_in_order_for_all_drivers() {
    for case in driver_cases() {
        let structure = case
            .connection
            .structure(&case.flow)
            .unwrap_or_else(|error| panic!("driver '{}' structure failed: {error}", case.driver));
        assert_eq!(
            structure.dimension_ids(),
            vec!["FREQ", "CURRENCY"],
            "driver '{}': dimensions",
            case.driver
        );
        assert_eq!(
            structure.time_dimension_id(),
            "TIME_PERIOD",
            "driver '{}': time dimension",
            case.driver
        );
    }
}

#[test]
fn full_data_returns_every_series_for_all_drivers() {
    for case in driver_cases() {
        let series = case
            .connection
            .series(&case.flow, &Key::ALL, DataDetail::Full)
            .unwrap_or_else(|error| panic!("driver '{}' data failed: {error}", case.driver));
        let keys: Vec<String> = series.iter().map(|s| s.key().to_string()).collect();
        assert_eq!(keys, vec!["M.USD", "A.JPY"], "driver '{}': keys", case.driver);
        assert_eq!(series[0].obs().len(), 2, "driver '{}': obs", case.driver);
    }
}

#[test]
fn keys_only_data_has_no_observations_for_all_drivers() {
    for case in driver_cases() {
        let series = case
            .connection
            .series(&case.flow, &Key::ALL, DataDetail::SeriesKeysOnly)
            .unwrap_or_else(|error| panic!("driver '{}' data failed: {error}", case.driver));
        assert_eq!(series.len(), 2, "driver '{}': series count", case.driver);
        assert!(
            series.iter().all(|s| s.obs().is_empty()),
            "driver '{}': observations hidden",
            case.driver
        );
    }
}

#[test]
fn unknown_flow_is_not_found_for_all_drivers() {
    let unknown = FlowRef::parse("ECB,UNKNOWN,1.0").expect("valid ref");
    for case in driver_cases() {
        let err = case.connection.flow(&unknown).expect_err("unknown flow");
        assert_eq!(err.kind(), SdmxErrorKind::NotFound, "driver '{}'", case.driver);
    }
}

#[test]
fn closed_connection_rejects_calls_for_all_drivers() {
    for mut case in driver_cases() {
        case.connection.close().expect("close");
        let err = case.connection.flows().expect_err("closed");
        // Managed connections report misuse through the failsafe channel.
        assert_eq!(err.kind(), SdmxErrorKind::Io, "driver '{}'", case.driver);
    }
}
