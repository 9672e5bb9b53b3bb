use rand::Rng;
use std::fs::File;
use std::io::{BufWriter, Write};

const CATEGORIES: [&str; 4] = ["Classic", "Veggie", "Supreme", "Chicken"];
const SIZES: [(&str, i64); 5] = [("S", 1200), ("M", 1600), ("L", 2050), ("XL", 2550), ("XXL", 3595)];

/// Usage: data_generator [PATH] [ROWS]
fn main() -> std::io::Result<()> {
    let mut argv = std::env::args().skip(1);
    let path = argv.next().unwrap_or_else(|| "data/pizza_sales.csv".to_string());
    let rows: usize = argv.next().and_then(|n| n.parse().ok()).unwrap_or(1_000_000);

    if let Some(parent) = std::path::Path::new(&path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(&path)?;
    let mut writer = BufWriter::new(file);

    writeln!(
        writer,
        "pizza_id,order_id,pizza_name_id,quantity,order_date,unit_price,total_price,pizza_size,pizza_category,pizza_ingredients"
    )?;

    let mut rng = rand::rng();
    let mut order_id = 1;
    for i in 0..rows {
        if rng.random_bool(0.4) {
            order_id += 1;
        }
        let category = CATEGORIES[rng.random_range(0..CATEGORIES.len())];
        let (size, cents) = SIZES[rng.random_range(0..SIZES.len())];
        let quantity: i64 = rng.random_range(1..=4);
        let month = rng.random_range(1..=12);
        let day = rng.random_range(1..=28);
        writeln!(
            writer,
            "{},{},{}_{},{},{}/{}/2015,{}.{:02},{}.{:02},{},{},\"Mozzarella Cheese, Tomatoes, Garlic\"",
            i + 1,
            order_id,
            category.to_lowercase(),
            size.to_lowercase(),
            quantity,
            month,
            day,
            cents / 100,
            cents % 100,
            cents * quantity / 100,
            cents * quantity % 100,
            size,
            category,
        )?;
    }
    writer.flush()?;

    println!("Sample CSV generated: {} ({} rows)", path, rows);
    Ok(())
}
