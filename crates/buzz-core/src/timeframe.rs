use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Look-back window understood by the upstream analytics API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    PastHour,
    PastFourHours,
    PastDay,
    #[default]
    PastWeek,
    PastMonth,
    PastQuarter,
    PastYear,
    PastFiveYears,
}

impl Timeframe {
    pub const ALL: [Timeframe; 8] = [
        Timeframe::PastHour,
        Timeframe::PastFourHours,
        Timeframe::PastDay,
        Timeframe::PastWeek,
        Timeframe::PastMonth,
        Timeframe::PastQuarter,
        Timeframe::PastYear,
        Timeframe::PastFiveYears,
    ];

    /// The literal string the explore endpoint expects in `comparisonItem[].time`.
    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::PastHour => "now 1-H",
            Timeframe::PastFourHours => "now 4-H",
            Timeframe::PastDay => "now 1-d",
            Timeframe::PastWeek => "now 7-d",
            Timeframe::PastMonth => "today 1-m",
            Timeframe::PastQuarter => "today 3-m",
            Timeframe::PastYear => "today 12-m",
            Timeframe::PastFiveYears => "today 5-y",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown timeframe '{s}'"))
    }
}

impl TryFrom<String> for Timeframe {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.as_str().to_string()
    }
}
