use anyhow::Result;
use nimbus_core::{App, AppError, Config};
use nimbus_weather::{ViewForecast, ViewWeatherBlock};

/// Number of dates shown in the day selector.
const DAYS_SHOWN: usize = 5;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize core
    nimbus_core::init()?;

    let (config, _) = Config::load_validated()?;
    tracing::debug!("Config directory: {}", config.config_dir.display());

    let app = App::new(config)?;

    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");

    let result = if query.trim().is_empty() {
        app.restore_last_search().await
    } else {
        app.search(&query).await
    };

    match result {
        Ok(Some(forecast)) => render(&forecast, app.last_fetch_label().as_deref()),
        Ok(None) => println!("Usage: nimbus <city>"),
        Err(e) => render_error(&e),
    }

    Ok(())
}

fn render(forecast: &ViewForecast, last_fetch: Option<&str>) {
    println!("{}, {}", forecast.city, forecast.country);
    if let Some(label) = last_fetch {
        println!("Last fetch · {}", label);
    }

    println!();
    println!("Now      {}", block_line(&forecast.current));
    println!("Summary  {}", block_line(&forecast.summary));
    for advisory in &forecast.current.advisories {
        println!("  ! {}", advisory);
    }

    for (date, slots) in forecast.days_by_date(DAYS_SHOWN) {
        println!();
        println!("{}", date);
        for slot in slots {
            println!("  {:>5}  {}", slot.time, block_line(slot));
        }
    }
}

fn block_line(block: &ViewWeatherBlock) -> String {
    format!(
        "{}°C (H {}° / L {}°)  {}  wind {} km/h  humidity {}%  {} hPa",
        reading(block.temp_c),
        reading(block.high_c),
        reading(block.low_c),
        block.condition,
        reading(block.wind_speed),
        reading(block.humidity),
        reading(block.pressure),
    )
}

fn reading(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.0}", v),
        None => "--".to_string(),
    }
}

fn render_error(error: &AppError) {
    tracing::debug!("Search failed: {:?}", error);
    eprintln!("{}", error.user_message());
}
