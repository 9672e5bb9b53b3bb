use std::io::Write;
use std::rc::Rc;

use pizza_insights::processor::{
    Dimension, GroupSpec, ProcessorError,
    aggregator::{Aggregator, round_half_up},
    query_builder::{QueryCache, QueryResult, SortKey},
    rolling::RollingAggregator,
    sales_processor::SalesProcessor,
};
use pizza_insights::report::{chart, export};
use rust_decimal::Decimal;
use tempfile::NamedTempFile;

const SALES: &str = "\
pizza_id,order_id,pizza_name_id,quantity,order_date,order_time,unit_price,total_price,pizza_size,pizza_category,pizza_ingredients,pizza_name
1,1,hawaiian_m,1,1/1/2015,11:38:36,13.25,13.25,M,Classic,\"Sliced Ham, Pineapple, Mozzarella Cheese\",The Hawaiian Pizza
2,2,classic_dlx_m,1,1/1/2015,11:57:40,16,16,M,Classic,\"Pepperoni, Mushrooms, Red Onions, Red Peppers, Bacon\",The Classic Deluxe Pizza
3,2,five_cheese_l,1,1/1/2015,11:57:40,18.5,18.5,L,Veggie,\"Mozzarella Cheese, Provolone Cheese, Smoked Gouda Cheese\",The Five Cheese Pizza
4,2,ital_supr_l,1,1/1/2015,11:57:40,20.75,20.75,L,Supreme,\"Calabrese Salami, Capocollo, Tomatoes\",The Italian Supreme Pizza
5,2,mexicana_m,1,4/1/2015,11:57:40,16,16,M,Veggie,\"Tomatoes, Red Peppers, Jalapeno Peppers\",The Mexicana Pizza
6,2,thai_ckn_l,2,4/1/2015,11:57:40,20.75,41.5,L,Chicken,\"Chicken, Pineapple, Tomatoes\",The Thai Chicken Pizza
7,3,ital_supr_m,1,7/1/2015,12:12:28,16.5,16.5,M,Supreme,\"Calabrese Salami, Capocollo, Tomatoes\",The Italian Supreme Pizza
8,3,prsc_argla_l,3,10/1/2015,12:12:28,20.75,62.25,L,Supreme,\"Prosciutto di San Daniele, Arugula\",The Prosciutto and Arugula Pizza
";

fn load(csv: &str) -> SalesProcessor {
    let mut tmp = NamedTempFile::new().unwrap();
    write!(tmp, "{}", csv).unwrap();
    let mut processor = SalesProcessor::new();
    processor.load_csv(tmp.path()).unwrap().into_result().unwrap();
    processor
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

#[test]
fn test_group_by_category_conserves_totals() {
    let processor = load(SALES);
    let rows = processor
        .group_by(&GroupSpec::new(&[Dimension::Category]))
        .unwrap();

    let names: Vec<_> = rows
        .iter()
        .map(|r| r.group_key.category.as_deref().unwrap())
        .collect();
    assert_eq!(names, vec!["Chicken", "Classic", "Supreme", "Veggie"]);

    let quantity: u64 = rows.iter().map(|r| r.total_quantity).sum();
    let revenue: Decimal = rows.iter().map(|r| r.total_revenue).sum();
    let totals = processor.totals().unwrap();
    assert_eq!(quantity, 11);
    assert_eq!(quantity, totals.total_quantity);
    assert_eq!(revenue, totals.total_revenue);
    assert_eq!(revenue, dec("204.75"));

    let supreme = &rows[2];
    assert_eq!(supreme.total_quantity, 5);
    assert_eq!(supreme.total_revenue, dec("99.50"));
    assert_eq!(supreme.total_unit_price, dec("58.00"));
}

#[test]
fn test_regroup_by_coarser_key_matches_direct() {
    let processor = load(SALES);
    let agg = Aggregator::new();
    let fine = processor
        .group_by(&GroupSpec::new(&[
            Dimension::Quarter,
            Dimension::Size,
            Dimension::Category,
        ]))
        .unwrap();

    for coarse in [
        GroupSpec::new(&[Dimension::Category]),
        GroupSpec::new(&[Dimension::Size, Dimension::Category]),
        GroupSpec::new(&[Dimension::Quarter]),
        GroupSpec::scalar(),
    ] {
        assert_eq!(
            agg.regroup(&fine, &coarse).unwrap(),
            processor.group_by(&coarse).unwrap()
        );
    }
}

#[test]
fn test_quarter_revenue_ordering() {
    let processor = Rc::new(load(SALES));
    let result = processor
        .query()
        .group_by(Dimension::Quarter)
        .execute()
        .unwrap();
    let QueryResult::Groups(rows) = result else {
        panic!("expected groups");
    };
    let labels: Vec<String> = rows.iter().map(|r| r.group_key.label()).collect();
    assert_eq!(labels, vec!["2015-Q1", "2015-Q2", "2015-Q3", "2015-Q4"]);
    assert_eq!(rows[1].total_revenue, dec("57.5"));
}

#[test]
fn test_cached_query_is_stable() {
    let processor = Rc::new(load(SALES));
    let cache = Rc::new(QueryCache::new());

    let first = processor
        .query_with_cache(&cache)
        .group_by(Dimension::Category)
        .order_by(SortKey::RevenueDesc)
        .execute()
        .unwrap();
    let second = processor
        .query_with_cache(&cache)
        .group_by(Dimension::Category)
        .order_by(SortKey::RevenueDesc)
        .execute()
        .unwrap();
    assert_eq!(first, second);

    let QueryResult::Groups(rows) = first else {
        panic!("expected groups");
    };
    assert_eq!(rows[0].group_key.category.as_deref(), Some("Supreme"));
}

#[test]
fn test_average_and_scaled_revenue() {
    let processor = load(SALES);
    let avg = processor.average_unit_price().unwrap();
    // 142.5 / 8
    assert_eq!(avg, dec("17.8125"));
    assert_eq!(round_half_up(avg, 2), dec("17.81"));
    assert_eq!(round_half_up(avg, 3), dec("17.813"));

    let totals = processor.totals().unwrap();
    assert_eq!(
        pizza_insights::report::scaled(totals.total_revenue, Decimal::from(1000), 2),
        dec("0.20")
    );
}

#[test]
fn test_invalid_row_aborts_strict_load() {
    let csv = "pizza_category,pizza_size,quantity,unit_price,total_price,order_date
Classic,M,2,10.0,20.0,2015-01-01
Classic,M,-1,10.0,-10.0,2015-01-02
";
    let mut tmp = NamedTempFile::new().unwrap();
    write!(tmp, "{}", csv).unwrap();
    let mut processor = SalesProcessor::new();
    let summary = processor.load_csv(tmp.path()).unwrap();
    match summary.into_result() {
        Err(ProcessorError::InvalidRecord { index, reason }) => {
            assert_eq!(index, 3);
            assert!(reason.contains("quantity"));
        }
        other => panic!("expected InvalidRecord, got {other:?}"),
    }
}

#[test]
fn test_rolling_matches_processor() {
    let processor = load(SALES);
    let spec = GroupSpec::new(&[Dimension::Size, Dimension::Category]);
    let records: Vec<_> = processor.records().iter().cloned().collect();

    let rolling = RollingAggregator::new(spec.clone());
    for batch in records.chunks(3) {
        rolling.ingest(batch).unwrap();
    }
    assert_eq!(*rolling.snapshot(), processor.group_by(&spec).unwrap());
}

#[test]
fn test_exports() {
    let processor = load(SALES);
    let rows = processor
        .group_by(&GroupSpec::new(&[Dimension::Category]))
        .unwrap();
    let dir = tempfile::tempdir().unwrap();

    let csv_path = dir.path().join("by_category.csv");
    export::write_summaries_csv(&csv_path, &rows).unwrap();
    let text = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(text.lines().count(), rows.len() + 1);

    // records written back out load to the same roll-ups
    let records_path = dir.path().join("records.csv");
    export::write_records_csv(&records_path, processor.records().iter()).unwrap();
    let mut reloaded = SalesProcessor::new();
    reloaded.load_csv(&records_path).unwrap().into_result().unwrap();
    assert_eq!(
        reloaded
            .group_by(&GroupSpec::new(&[Dimension::Category]))
            .unwrap(),
        rows
    );

    let chart_path = dir.path().join("chart.json");
    let chart = chart::bubble_chart("Pizza Sales Analysis", &rows, 50.0);
    export::write_json(&chart_path, &chart).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&chart_path).unwrap()).unwrap();
    assert_eq!(json["points"].as_array().unwrap().len(), 4);
}
