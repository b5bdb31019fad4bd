use purchase_report_builder::*;
use std::env;
use std::fs;

const TOP_SUPPLIERS: usize = 10;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let data_path = args.next().unwrap_or_else(|| "compras.xlsx".to_string());

    let config = match args.next() {
        Some(config_path) => ReportConfig::from_json(&fs::read_to_string(config_path)?)?,
        None => ReportConfig {
            target_status: "FINALIZADO".to_string(),
            columns: ColumnMapping::portuguese(),
            ..ReportConfig::default()
        },
    };

    let is_workbook = [".xlsx", ".xls", ".ods"]
        .iter()
        .any(|ext| data_path.to_lowercase().ends_with(ext));
    let dataset = if is_workbook {
        Dataset::from_xlsx_path(&data_path, DEFAULT_SHEET, &config.columns)?
    } else {
        Dataset::from_csv_path(&data_path, &config.columns)?
    };
    let engine = ReportEngine::new(&dataset, &config)?;
    let options = engine.selection_options();

    println!("📊 Purchase Dashboard ({})\n", data_path);
    println!(
        "Loaded {} rows, {} with status {}\n",
        dataset.load_report().rows_read,
        engine.filtered().len(),
        config.target_status
    );

    println!("🔝 Top {} suppliers (total value)\n", TOP_SUPPLIERS);
    let totals = engine.supplier_totals()?;
    let top: Vec<SupplierTotal> = totals.into_iter().take(TOP_SUPPLIERS).collect();
    println!("{}", supplier_totals_to_markdown(&top));

    println!("📅 Monthly purchases by year\n");
    println!("{}", engine.monthly_comparison()?.to_markdown("Month"));

    // Mirror the dashboard defaults: first supplier, every store.
    let Some(supplier) = options.legal_names.first() else {
        println!("⚠️  No purchases with status {}", config.target_status);
        return Ok(());
    };
    let selection = Selection::new(supplier.clone(), options.stores.clone());

    println!(
        "📋 Detail for {} across {} stores\n",
        selection.legal_name,
        selection.stores.len()
    );
    match engine.supplier_store_summary(&selection)? {
        SelectionOutcome::Data(summary) => {
            println!("{}", summary.to_markdown("Month"));
            println!("Chart series: {} points", summary.data().melt().len());
        }
        SelectionOutcome::NoData => {
            println!("⚠️  No data for this supplier and store selection")
        }
    }

    let year = options.years.last().copied().unwrap_or_default();
    println!(
        "\n🏆 Supplier ranking for {} (≥ {}% of the total)\n",
        year, config.ranking_threshold_pct
    );
    match engine.supplier_ranking(year) {
        Ok(ranking) => println!("{}", ranking_to_markdown(&ranking)),
        Err(e) if e.is_no_data() => println!("⚠️  No purchases in {}", year),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
