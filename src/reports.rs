// 🥇 Gold Reports - declarative SQL over the silver star schema
//
// Each report is a SELECT with a {silver} placeholder for the source dataset.
// The warehouse materializes it as gold.<name>, replacing the previous run.
// Distributor is the region proxy, as in the silver joins.
// GROUP BY names source columns: a bare alias like trade_group would bind to
// dim_channel.trade_group instead of the output column.

use crate::error::{EtlError, Result};
use crate::warehouse::Warehouse;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct GoldReport {
    pub name: &'static str,
    pub description: &'static str,
    query: &'static str,
}

impl GoldReport {
    /// SELECT statement bound to a silver dataset
    pub fn sql(&self, silver: &str) -> String {
        self.query.replace("{silver}", &format!("\"{}\"", silver))
    }
}

pub const GOLD_REPORTS: [GoldReport; 3] = [
    GoldReport {
        name: "sales_top3_tradegroups_by_region",
        description: "Top 3 trade groups by region",
        query: "WITH channel_sales AS (
              SELECT
                d.natural_key AS region,
                c.trade_channel AS trade_group,
                SUM(f.volume_usd) AS total_sales_usd
              FROM {silver}.fact_sales f
              JOIN {silver}.dim_distributor d ON f.distributor_id = d.distributor_id
              JOIN {silver}.dim_channel c ON f.channel_id = c.channel_id
              GROUP BY d.natural_key, c.trade_channel
            ),
            ranked AS (
              SELECT
                region,
                trade_group,
                total_sales_usd,
                ROW_NUMBER() OVER (
                  PARTITION BY region
                  ORDER BY total_sales_usd DESC, trade_group
                ) AS rn
              FROM channel_sales
            )
            SELECT region, trade_group, total_sales_usd
            FROM ranked
            WHERE rn <= 3
            ORDER BY region, total_sales_usd DESC",
    },
    GoldReport {
        name: "sales_by_brand_month",
        description: "Sales by brand and month",
        query: "SELECT
              b.brand AS brand_name,
              CAST(strftime('%Y', f.date) AS INTEGER) AS year,
              CAST(strftime('%m', f.date) AS INTEGER) AS month,
              ROUND(SUM(f.volume_usd), 2) AS total_sales_usd
            FROM {silver}.fact_sales f
            JOIN {silver}.dim_brand b ON f.brand_id = b.brand_id
            GROUP BY b.brand, strftime('%Y', f.date), strftime('%m', f.date)
            ORDER BY brand_name, year, month",
    },
    GoldReport {
        name: "lowest_brand_by_region",
        description: "Lowest-volume brand by region",
        query: "WITH brand_sales AS (
              SELECT
                d.natural_key AS region,
                b.brand AS brand_name,
                SUM(f.volume_usd) AS total_sales_usd
              FROM {silver}.fact_sales f
              JOIN {silver}.dim_brand b ON f.brand_id = b.brand_id
              JOIN {silver}.dim_distributor d ON f.distributor_id = d.distributor_id
              GROUP BY d.natural_key, b.brand
            ),
            ranked AS (
              SELECT
                region,
                brand_name,
                total_sales_usd,
                ROW_NUMBER() OVER (
                  PARTITION BY region
                  ORDER BY total_sales_usd ASC, brand_name
                ) AS rn
              FROM brand_sales
            )
            SELECT region, brand_name, total_sales_usd
            FROM ranked
            WHERE rn = 1
            ORDER BY region",
    },
];

pub fn find_report(name: &str) -> Option<&'static GoldReport> {
    GOLD_REPORTS.iter().find(|r| r.name == name)
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportOutcome {
    pub name: String,
    pub rows: usize,
}

/// Materialize every gold report from `silver` into `gold`
pub fn run_reports(
    warehouse: &mut Warehouse,
    silver: &str,
    gold: &str,
) -> Result<Vec<ReportOutcome>> {
    if !warehouse.open_dataset(silver)? {
        return Err(EtlError::Configuration(format!(
            "silver dataset '{}' does not exist; run the pipeline first",
            silver
        )));
    }
    for required in ["fact_sales", "dim_brand", "dim_distributor", "dim_channel"] {
        if !warehouse.table_exists(silver, required)? {
            return Err(EtlError::Configuration(format!(
                "silver table {}.{} not published; run the pipeline first",
                silver, required
            )));
        }
    }

    let mut outcomes = Vec::with_capacity(GOLD_REPORTS.len());
    for report in &GOLD_REPORTS {
        info!(report = report.name, "creating {}", report.description);
        let rows = warehouse.create_table_as(gold, report.name, &report.sql(silver))?;
        info!(report = report.name, rows, "report created");
        outcomes.push(ReportOutcome {
            name: report.name.to_string(),
            rows,
        });
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimensions::{BrandRecord, ChannelRecord, DistributorRecord};
    use crate::fact::FactRecord;
    use crate::keys::surrogate_key;
    use crate::warehouse::PublishedTable;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn channel(name: &str) -> ChannelRecord {
        ChannelRecord {
            channel_id: surrogate_key(name),
            trade_channel: name.to_string(),
            trade_group: "GROUP".to_string(),
            trade_type: "TYPE".to_string(),
        }
    }

    fn fact(day: u32, brand: &str, distributor: &str, channel: &str, volume: f64) -> FactRecord {
        FactRecord {
            date: NaiveDate::from_ymd_opt(2024, if day > 28 { 2 } else { 1 }, day.min(28)).unwrap(),
            brand_id: Some(surrogate_key(brand)),
            distributor_id: Some(surrogate_key(distributor)),
            channel_id: Some(surrogate_key(channel)),
            region_id: None,
            volume_usd: volume,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        }
    }

    fn seeded_warehouse() -> Warehouse {
        let mut wh = Warehouse::open_in_memory().unwrap();
        let brands = vec![
            BrandRecord::new("P", Some("Pepsi Zero")),
            BrandRecord::new("S", Some("Sprite")),
        ];
        let distributors = vec![DistributorRecord::new("North"), DistributorRecord::new("South")];
        let channels: Vec<ChannelRecord> =
            ["BAR", "MARKET", "KIOSK", "DELI"].iter().map(|c| channel(c)).collect();
        let facts = vec![
            fact(1, "P", "North", "BAR", 10.0),
            fact(2, "P", "North", "MARKET", 30.0),
            fact(3, "S", "North", "KIOSK", 5.0),
            fact(4, "S", "North", "DELI", 1.0),
            fact(30, "P", "South", "BAR", 2.5),
            fact(5, "S", "South", "BAR", 7.126),
        ];

        wh.publish("silver", &PublishedTable::from_records("dim_brand", &brands)).unwrap();
        wh.publish("silver", &PublishedTable::from_records("dim_distributor", &distributors))
            .unwrap();
        wh.publish("silver", &PublishedTable::from_records("dim_channel", &channels))
            .unwrap();
        wh.publish("silver", &PublishedTable::from_records("fact_sales", &facts)).unwrap();
        wh
    }

    #[test]
    fn test_run_reports() {
        let mut wh = seeded_warehouse();

        let outcomes = run_reports(&mut wh, "silver", "gold").unwrap();
        let counts: Vec<(String, usize)> = outcomes.into_iter().map(|o| (o.name, o.rows)).collect();
        println!("{:?}", counts);

        assert_eq!(
            counts,
            vec![
                ("sales_top3_tradegroups_by_region".to_string(), 4),
                ("sales_by_brand_month".to_string(), 3),
                ("lowest_brand_by_region".to_string(), 2),
            ]
        );
    }

    #[test]
    fn test_top3_and_lowest_brand() {
        let mut wh = seeded_warehouse();
        run_reports(&mut wh, "silver", "gold").unwrap();

        let top = wh.read_rows("gold", "sales_top3_tradegroups_by_region").unwrap();
        let north: Vec<&str> = top
            .iter()
            .filter(|r| r["region"] == "North")
            .filter_map(|r| r["trade_group"].as_str())
            .collect();
        assert_eq!(north, vec!["MARKET", "BAR", "KIOSK"]);

        let lowest = wh.read_rows("gold", "lowest_brand_by_region").unwrap();
        assert_eq!(lowest[0]["region"], "North");
        assert_eq!(lowest[0]["brand_name"], "Sprite");
        assert_eq!(lowest[1]["region"], "South");
        assert_eq!(lowest[1]["brand_name"], "Pepsi");
    }

    #[test]
    fn test_sales_by_brand_month_rounds() {
        let mut wh = seeded_warehouse();
        run_reports(&mut wh, "silver", "gold").unwrap();

        let rows = wh.read_rows("gold", "sales_by_brand_month").unwrap();
        let sprite: Vec<_> = rows.iter().filter(|r| r["brand_name"] == "Sprite").collect();

        assert_eq!(sprite.len(), 1);
        assert_eq!(sprite[0]["year"], 2024);
        assert_eq!(sprite[0]["month"], 1);
        assert_eq!(sprite[0]["total_sales_usd"], 13.13);
    }

    #[test]
    fn test_reports_require_silver_tables() {
        let mut wh = Warehouse::open_in_memory().unwrap();
        let err = run_reports(&mut wh, "silver", "gold").unwrap_err();
        assert!(err.is_configuration());
        assert!(!wh.dataset_exists("silver").unwrap());

        wh.ensure_dataset("silver").unwrap();
        let err = run_reports(&mut wh, "silver", "gold").unwrap_err();
        assert!(err.is_configuration());
        assert!(find_report("sales_by_brand_month").is_some());
        assert!(find_report("nope").is_none());
    }

    #[test]
    fn test_top3_ranks_channels_sharing_a_trade_group() {
        let mut wh = Warehouse::open_in_memory().unwrap();
        let brands = vec![BrandRecord::new("P", Some("Pepsi"))];
        let distributors = vec![DistributorRecord::new("North")];
        // every channel has trade_group "GROUP"
        let channels: Vec<ChannelRecord> = ["A", "B", "C", "D"].iter().map(|c| channel(c)).collect();
        let facts = vec![
            fact(1, "P", "North", "A", 1.0),
            fact(2, "P", "North", "B", 2.0),
            fact(3, "P", "North", "C", 3.0),
            fact(4, "P", "North", "D", 4.0),
        ];
        wh.publish("silver", &PublishedTable::from_records("dim_brand", &brands)).unwrap();
        wh.publish("silver", &PublishedTable::from_records("dim_distributor", &distributors))
            .unwrap();
        wh.publish("silver", &PublishedTable::from_records("dim_channel", &channels))
            .unwrap();
        wh.publish("silver", &PublishedTable::from_records("fact_sales", &facts)).unwrap();

        run_reports(&mut wh, "silver", "gold").unwrap();

        let rows = wh.read_rows("gold", "sales_top3_tradegroups_by_region").unwrap();
        let ranked: Vec<(&str, f64)> = rows
            .iter()
            .filter_map(|r| Some((r["trade_group"].as_str()?, r["total_sales_usd"].as_f64()?)))
            .collect();
        assert_eq!(ranked, vec![("D", 4.0), ("C", 3.0), ("B", 2.0)]);
    }
}
