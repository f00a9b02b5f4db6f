use awattar_prices::{get_prices, AwattarZone};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let zone = AwattarZone::Germany;
    let prices = get_prices(
        zone.country_code(),
        Some(chrono::Utc::now() - chrono::Duration::days(2)),
        Some(chrono::Utc::now()),
    )
    .expect("Querying prices failed.");

    println!("Prices from two days ago to today:");
    for record in prices {
        let tz = zone.timezone();
        match record.price_eur_per_kwh() {
            Some(eur_per_kwh) => println!(
                "{} - {}: {:.04} €/kWh",
                record.start_in(&tz),
                record.end_in(&tz),
                eur_per_kwh
            ),
            None => println!(
                "{} - {}: {} {}",
                record.start_in(&tz),
                record.end_in(&tz),
                record.market_price(),
                record.unit()
            ),
        }
    }
}
