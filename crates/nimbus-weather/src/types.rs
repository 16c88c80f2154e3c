use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// City metadata returned alongside a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityInfo {
    pub name: String,
    #[serde(default)]
    pub country: String,
}

/// One forecast slot as delivered by the weather API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWeatherBlock {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub temperature_max: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub temperature_min: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub wind_speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub humidity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub pressure: Option<f64>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub weather_types: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Links {
    #[serde(rename = "self", default)]
    pub self_link: Option<String>,
    #[serde(default)]
    pub forecast: Option<String>,
}

/// Body of `GET /weather/{city}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawForecastResponse {
    pub city_info: CityInfo,
    pub current: RawWeatherBlock,
    #[serde(default)]
    pub days: Vec<RawWeatherBlock>,
    pub summary: RawWeatherBlock,
    #[serde(default)]
    pub links: Option<Links>,
}

/// A reading that is absent, null, or not a number is `None`.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(deserializer)?.as_f64())
}

/// Accepts a list and renders each item as text: strings as-is, null as an
/// empty string, anything else as its JSON text. A non-list becomes an empty
/// list.
fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// A forecast slot shaped for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewWeatherBlock {
    pub date: String,
    pub time: String,
    pub temp_c: Option<f64>,
    pub high_c: Option<f64>,
    pub low_c: Option<f64>,
    /// Weather types joined with ", ".
    pub condition: String,
    pub advisories: Vec<String>,
    pub wind_speed: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
}

impl From<&RawWeatherBlock> for ViewWeatherBlock {
    fn from(block: &RawWeatherBlock) -> Self {
        Self {
            date: block.date.clone(),
            time: block.time.clone(),
            temp_c: block.temperature,
            high_c: block.temperature_max,
            low_c: block.temperature_min,
            condition: block.weather_types.join(", "),
            advisories: block.recommendations.clone(),
            wind_speed: block.wind_speed,
            humidity: block.humidity,
            pressure: block.pressure,
        }
    }
}

/// A complete forecast ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewForecast {
    pub city: String,
    pub country: String,
    pub current: ViewWeatherBlock,
    /// Currently identical to `all`.
    pub today: Vec<ViewWeatherBlock>,
    pub summary: ViewWeatherBlock,
    pub all: Vec<ViewWeatherBlock>,
}

impl ViewForecast {
    /// Group `all` by date in first-seen order, keeping at most `limit` dates.
    pub fn days_by_date(&self, limit: usize) -> Vec<(String, Vec<&ViewWeatherBlock>)> {
        let mut groups: Vec<(String, Vec<&ViewWeatherBlock>)> = Vec::new();

        for block in &self.all {
            match groups.iter_mut().find(|(date, _)| *date == block.date) {
                Some((_, slots)) => slots.push(block),
                None => groups.push((block.date.clone(), vec![block])),
            }
        }

        groups.truncate(limit);
        groups
    }
}
