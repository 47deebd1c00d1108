//! Defines the `WeatherCode` enum, mapping the WMO weather interpretation codes used by the
//! Open-Meteo archive to human-readable descriptions.

/// Represents a daily weather code as reported by the Open-Meteo archive (`weather_code`).
///
/// The archive reports the most severe condition observed during a day, encoded with the
/// WMO interpretation codes. Only a subset of the 0-99 range is ever used; see the
/// [Open-Meteo documentation](https://open-meteo.com/en/docs) for the official list.
///
/// The history store persists the *description* of a code rather than the number, so the
/// mapping must stay a bijection: [`WeatherCode::description`] and
/// [`WeatherCode::from_description`] are inverses of each other.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum WeatherCode {
    /// Code 0
    ClearSky = 0,
    /// Code 1
    MainlyClear = 1,
    /// Code 2
    PartlyCloudy = 2,
    /// Code 3
    Overcast = 3,
    /// Code 45
    Fog = 45,
    /// Code 48
    RimeFog = 48,
    /// Code 51
    DrizzleLight = 51,
    /// Code 53
    DrizzleModerate = 53,
    /// Code 55
    DrizzleDense = 55,
    /// Code 56
    FreezingDrizzleLight = 56,
    /// Code 57
    FreezingDrizzleDense = 57,
    /// Code 61
    RainLight = 61,
    /// Code 63
    RainModerate = 63,
    /// Code 65
    RainHeavy = 65,
    /// Code 66
    FreezingRainLight = 66,
    /// Code 67
    FreezingRainHeavy = 67,
    /// Code 71
    SnowFallLight = 71,
    /// Code 73
    SnowFallModerate = 73,
    /// Code 75
    SnowFallHeavy = 75,
    /// Code 77
    SnowGrains = 77,
    /// Code 80
    RainShowersLight = 80,
    /// Code 81
    RainShowersModerate = 81,
    /// Code 82
    RainShowersViolent = 82,
    /// Code 85
    SnowShowersLight = 85,
    /// Code 86
    SnowShowersHeavy = 86,
    /// Code 95
    Thunderstorm = 95,
    /// Code 96
    ThunderstormSlightHail = 96,
    /// Code 99
    ThunderstormHeavyHail = 99,
}

const ALL_CODES: [WeatherCode; 28] = [
    WeatherCode::ClearSky,
    WeatherCode::MainlyClear,
    WeatherCode::PartlyCloudy,
    WeatherCode::Overcast,
    WeatherCode::Fog,
    WeatherCode::RimeFog,
    WeatherCode::DrizzleLight,
    WeatherCode::DrizzleModerate,
    WeatherCode::DrizzleDense,
    WeatherCode::FreezingDrizzleLight,
    WeatherCode::FreezingDrizzleDense,
    WeatherCode::RainLight,
    WeatherCode::RainModerate,
    WeatherCode::RainHeavy,
    WeatherCode::FreezingRainLight,
    WeatherCode::FreezingRainHeavy,
    WeatherCode::SnowFallLight,
    WeatherCode::SnowFallModerate,
    WeatherCode::SnowFallHeavy,
    WeatherCode::SnowGrains,
    WeatherCode::RainShowersLight,
    WeatherCode::RainShowersModerate,
    WeatherCode::RainShowersViolent,
    WeatherCode::SnowShowersLight,
    WeatherCode::SnowShowersHeavy,
    WeatherCode::Thunderstorm,
    WeatherCode::ThunderstormSlightHail,
    WeatherCode::ThunderstormHeavyHail,
];

impl WeatherCode {
    /// Attempts to convert a numeric archive code into a `WeatherCode` variant.
    ///
    /// # Returns
    ///
    /// * `Some(WeatherCode)` if `value` is one of the codes the archive uses.
    /// * `None` otherwise.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use weather_history::WeatherCode;
    ///
    /// assert_eq!(WeatherCode::from_i64(63), Some(WeatherCode::RainModerate));
    /// assert_eq!(WeatherCode::from_i64(4), None);
    /// ```
    pub fn from_i64(value: i64) -> Option<Self> {
        ALL_CODES.iter().copied().find(|code| code.code() == value)
    }

    /// The numeric WMO code of this variant.
    pub fn code(self) -> i64 {
        self as i64
    }

    /// The human-readable label stored in the history files.
    pub fn description(self) -> &'static str {
        match self {
            WeatherCode::ClearSky => "Clear sky",
            WeatherCode::MainlyClear => "Mainly clear",
            WeatherCode::PartlyCloudy => "Partly cloudy",
            WeatherCode::Overcast => "Overcast",
            WeatherCode::Fog => "Fog",
            WeatherCode::RimeFog => "Depositing rime fog",
            WeatherCode::DrizzleLight => "Drizzle: Light",
            WeatherCode::DrizzleModerate => "Drizzle: Moderate",
            WeatherCode::DrizzleDense => "Drizzle: Dense",
            WeatherCode::FreezingDrizzleLight => "Freezing Drizzle: Light",
            WeatherCode::FreezingDrizzleDense => "Freezing Drizzle: Dense",
            WeatherCode::RainLight => "Rain: Light",
            WeatherCode::RainModerate => "Rain: Moderate",
            WeatherCode::RainHeavy => "Rain: Heavy",
            WeatherCode::FreezingRainLight => "Freezing Rain: Light",
            WeatherCode::FreezingRainHeavy => "Freezing Rain: Heavy",
            WeatherCode::SnowFallLight => "Snow fall: Light",
            WeatherCode::SnowFallModerate => "Snow fall: Moderate",
            WeatherCode::SnowFallHeavy => "Snow fall: Heavy",
            WeatherCode::SnowGrains => "Snow grains",
            WeatherCode::RainShowersLight => "Rain showers: Light",
            WeatherCode::RainShowersModerate => "Rain showers: Moderate",
            WeatherCode::RainShowersViolent => "Rain showers: Violent",
            WeatherCode::SnowShowersLight => "Snow showers: Light",
            WeatherCode::SnowShowersHeavy => "Snow showers: Heavy",
            WeatherCode::Thunderstorm => "Thunderstorm: Light/Moderate",
            WeatherCode::ThunderstormSlightHail => "Thunderstorm with slight hail",
            WeatherCode::ThunderstormHeavyHail => "Thunderstorm with heavy hail",
        }
    }

    /// Looks up the variant whose [`description`](Self::description) equals `label`.
    pub fn from_description(label: &str) -> Option<Self> {
        ALL_CODES
            .iter()
            .copied()
            .find(|code| code.description() == label)
    }
}

/// Describes any numeric weather code, known or not.
///
/// Unknown codes render as `"Unknown (<code>)"`; this never fails.
///
/// # Examples
///
/// ```rust
/// use weather_history::describe_weather_code;
///
/// assert_eq!(describe_weather_code(0), "Clear sky");
/// assert_eq!(describe_weather_code(42), "Unknown (42)");
/// ```
pub fn describe_weather_code(code: i64) -> String {
    match WeatherCode::from_i64(code) {
        Some(known) => known.description().to_string(),
        None => format!("Unknown ({})", code),
    }
}

/// Inverse of [`describe_weather_code`]: recovers the numeric code from a stored label.
pub(crate) fn parse_weather_description(label: &str) -> Option<i64> {
    if let Some(known) = WeatherCode::from_description(label) {
        return Some(known.code());
    }
    label
        .strip_prefix("Unknown (")?
        .strip_suffix(')')?
        .parse::<i64>()
        .ok()
}
