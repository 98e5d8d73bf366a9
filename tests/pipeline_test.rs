use std::io::Write;
use std::path::PathBuf;

use account_heatmap::config::{Config, GeocoderConfig, ServerConfig, SourcesConfig};
use account_heatmap::error::{HeatmapError, LoadError};
use account_heatmap::pipeline::processing::filter::Selection;
use account_heatmap::pipeline::processing::normalize::Vertical;
use account_heatmap::pipeline::{HeatmapFocus, HeatmapPipeline, ViewParams};
use tempfile::{NamedTempFile, TempDir};

const READY: &str = "\
SAV Name,Business Entity,Product List Price $,LDOS FY,Install Site Name,Install Site Address 1,Install Site City,Install Site State,Install Site Postal Code
LINCOLN SCHOOL DISTRICT,Networking,100,,HQ,1 Main St,Chicago,IL,60601
LINCOLN SCHOOL DISTRICT,Security,250,2027,HQ,1 Main St,Chicago,IL,60601
CITY OF SPRINGFIELD,Security,75,,City Hall,2 Elm St,Springfield,IL,00000
OAK SCHOOL DISTRICT,Collaboration,40,,Annex,3 Oak Ave,Boston,MA,2134
";

const SPOT: &str = "\
Account Name,Top EquipMake Share%,Top Provider Share%,Oppty Score ,Threat Score,Budget ($K),Remaining Budget ($K)
LINCOLN SCHOOL DISTRICT,Cisco (55%),CDW (30%),8,2,120,45
OAK SCHOOL DISTRICT,Juniper (40%),SHI (20%),5,1,60,10
";

const GEONAMES: &str = "\
US\t60601\tChicago\tIllinois\tIL\tCook\t031\t\t\t41.8858\t-87.6181\t4
US\t02134\tAllston\tMassachusetts\tMA\tSuffolk\t025\t\t\t42.3539\t-71.1337\t4
";

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

fn config(dir: &TempDir, ready: &str) -> Config {
    Config {
        sources: SourcesConfig {
            ready_path: write_file(dir, "ready.csv", ready),
            spot_path: write_file(dir, "spot.csv", SPOT),
        },
        geocoder: GeocoderConfig {
            postal_table_path: Some(write_file(dir, "US.txt", GEONAMES)),
            country: "US".to_string(),
        },
        server: ServerConfig { port: 0 },
    }
}

fn pipeline() -> (TempDir, HeatmapPipeline) {
    let dir = TempDir::new().unwrap();
    let pipeline = HeatmapPipeline::from_config(&config(&dir, READY)).unwrap();
    (dir, pipeline)
}

#[test]
fn test_end_to_end_geographic_frame() {
    let (_dir, pipeline) = pipeline();
    let frame = pipeline.run(&ViewParams::default());

    let names: Vec<&str> = frame.rows.iter().map(|r| r.account_name.as_str()).collect();
    assert_eq!(
        names,
        vec!["CITY OF SPRINGFIELD", "LINCOLN SCHOOL DISTRICT", "OAK SCHOOL DISTRICT"]
    );

    let lincoln = &frame.rows[1];
    assert_eq!(lincoln.total_spend, 350.0);
    assert_eq!(lincoln.total_sites, 1);
    assert_eq!(lincoln.total_ldos, Some(250.0));
    assert_eq!(lincoln.vertical, Vertical::Education);
    assert_eq!(lincoln.latitude, Some(41.8858));
    assert_eq!(lincoln.opportunity.primary_vendor.as_deref(), Some("Cisco"));
    assert_eq!(lincoln.opportunity.top_partner_share, Some(30.0));

    // "2134" resolves as 02134
    let oak = &frame.rows[2];
    assert_eq!(oak.longitude, Some(-71.1337));

    let total: f64 = frame.rows.iter().map(|r| r.total_spend).sum();
    assert_eq!(total, 465.0);
}

#[test]
fn test_unknown_postal_code_stays_in_frame() {
    let (_dir, pipeline) = pipeline();
    let frame = pipeline.run(&ViewParams::default());

    let springfield = &frame.rows[0];
    assert_eq!(springfield.postal_code.as_deref(), Some("00000"));
    assert_eq!(springfield.latitude, None);
    assert_eq!(springfield.longitude, None);
    assert_eq!(frame.unplotted, 1);
    assert_eq!(frame.rows.len(), 3);
}

#[test]
fn test_account_absent_from_spot_keeps_null_metrics() {
    let (_dir, pipeline) = pipeline();
    let frame = pipeline.run(&ViewParams::default());

    let springfield = &frame.rows[0];
    assert_eq!(springfield.account_name, "CITY OF SPRINGFIELD");
    assert_eq!(springfield.opportunity.primary_vendor, None);
    assert_eq!(springfield.opportunity.budget_k, None);
    assert_eq!(springfield.total_spend, 75.0);
}

#[test]
fn test_vertical_filter() {
    let (_dir, pipeline) = pipeline();
    let frame = pipeline.run(&ViewParams {
        vertical: Selection::only("State & Local Gov"),
        ..Default::default()
    });

    assert_eq!(frame.rows.len(), 1);
    assert_eq!(frame.rows[0].account_name, "CITY OF SPRINGFIELD");
}

#[test]
fn test_spot_focus_vendor_filter() {
    let (_dir, pipeline) = pipeline();
    let frame = pipeline.run(&ViewParams {
        focus: HeatmapFocus::Spot,
        vendor: Selection::only("Juniper"),
        ..Default::default()
    });

    assert_eq!(frame.rows.len(), 1);
    assert_eq!(frame.rows[0].account_name, "OAK SCHOOL DISTRICT");
    assert_eq!(frame.encoding.size_max, Some(15));
}

#[test]
fn test_account_spend_entity_grouping() {
    let (_dir, pipeline) = pipeline();
    let frame = pipeline.run(&ViewParams {
        focus: HeatmapFocus::AccountSpend,
        business_entity: Selection::only("Security"),
        ..Default::default()
    });

    assert_eq!(frame.rows.len(), 2);
    let lincoln = frame
        .rows
        .iter()
        .find(|r| r.account_name == "LINCOLN SCHOOL DISTRICT")
        .unwrap();
    assert_eq!(lincoln.business_entity.as_deref(), Some("Security"));
    assert_eq!(lincoln.total_spend, 250.0);
}

#[test]
fn test_csv_export_has_one_line_per_row() {
    let (_dir, pipeline) = pipeline();
    let frame = pipeline.run(&ViewParams::default());

    let mut out = NamedTempFile::new().unwrap();
    frame.write_csv(out.as_file_mut()).unwrap();
    let text = std::fs::read_to_string(out.path()).unwrap();
    assert_eq!(text.lines().count(), frame.rows.len() + 1);
    assert!(text.contains("LINCOLN SCHOOL DISTRICT,,Education,350.0"));
}

#[test]
fn test_missing_column_is_fatal() {
    let dir = TempDir::new().unwrap();
    let broken = "SAV Name,Business Entity\nLINCOLN SCHOOL DISTRICT,Networking\n";
    let result = HeatmapPipeline::from_config(&config(&dir, broken));

    match result {
        Err(HeatmapError::Load(LoadError::MissingColumn { column, .. })) => {
            assert_eq!(column, "Product List Price $")
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected a missing column error"),
    }
}

#[test]
fn test_without_postal_table_nothing_is_plotted() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir, READY);
    config.geocoder.postal_table_path = None;

    let pipeline = HeatmapPipeline::from_config(&config).unwrap();
    let frame = pipeline.run(&ViewParams::default());
    assert_eq!(frame.rows.len(), 3);
    assert_eq!(frame.unplotted, 3);
}

#[test]
fn test_xlsx_ready_export_matches_csv() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir, READY);
    config.sources.ready_path =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/ready.xlsx");

    let from_xlsx = HeatmapPipeline::from_config(&config).unwrap();
    // The workbook carries one extra row with a blank account name
    assert_eq!(from_xlsx.dataset().installations.len(), 4);

    let xlsx_frame = from_xlsx.run(&ViewParams::default());
    let (_csv_dir, from_csv) = pipeline();
    let csv_frame = from_csv.run(&ViewParams::default());
    assert_eq!(xlsx_frame.rows, csv_frame.rows);

    let lincoln = &xlsx_frame.rows[1];
    assert_eq!(lincoln.postal_code.as_deref(), Some("60601"));
    assert_eq!(lincoln.total_spend, 350.0);
    assert!(lincoln.has_coordinates());
}

#[test]
fn test_non_numeric_spend_does_not_poison_totals() {
    let dir = TempDir::new().unwrap();
    let ready = "\
SAV Name,Business Entity,Product List Price $,LDOS FY,Install Site Name,Install Site Address 1,Install Site City,Install Site State,Install Site Postal Code
A SCHOOL,Networking,100,,HQ,1 Main St,Chicago,IL,60601
A SCHOOL,Networking,NaN,,HQ,1 Main St,Chicago,IL,60601
B CITY,Security,inf,,Hall,2 Elm St,Chicago,IL,60601
";
    let pipeline = HeatmapPipeline::from_config(&config(&dir, ready)).unwrap();
    let spends: Vec<Option<f64>> = pipeline.dataset().installations.iter().map(|r| r.spend).collect();
    assert_eq!(spends, vec![Some(100.0), None, None]);

    let frame = pipeline.run(&ViewParams::default());
    assert_eq!(frame.rows[0].account_name, "A SCHOOL");
    assert_eq!(frame.rows[0].total_spend, 100.0);
    assert_eq!(frame.rows[1].total_spend, 0.0);

    let json = serde_json::to_value(&frame.rows).unwrap();
    assert_eq!(json[0]["Total Spend"], 100.0);
    assert_eq!(json[1]["Total Spend"], 0.0);
}
