use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::series::Category;

/// ISO 3166-1 alpha-2 codes; reports exist for a subset and the rest fail acquisition.
const COUNTRY_CODES: &[&str] = &[
    "AD", "AE", "AF", "AG", "AI", "AL", "AM", "AO", "AQ", "AR", "AS", "AT", "AU", "AW", "AX", "AZ",
    "BA", "BB", "BD", "BE", "BF", "BG", "BH", "BI", "BJ", "BL", "BM", "BN", "BO", "BQ", "BR", "BS",
    "BT", "BV", "BW", "BY", "BZ", "CA", "CC", "CD", "CF", "CG", "CH", "CI", "CK", "CL", "CM", "CN",
    "CO", "CR", "CU", "CV", "CW", "CX", "CY", "CZ", "DE", "DJ", "DK", "DM", "DO", "DZ", "EC", "EE",
    "EG", "EH", "ER", "ES", "ET", "FI", "FJ", "FK", "FM", "FO", "FR", "GA", "GB", "GD", "GE", "GF",
    "GG", "GH", "GI", "GL", "GM", "GN", "GP", "GQ", "GR", "GS", "GT", "GU", "GW", "GY", "HK", "HM",
    "HN", "HR", "HT", "HU", "ID", "IE", "IL", "IM", "IN", "IO", "IQ", "IR", "IS", "IT", "JE", "JM",
    "JO", "JP", "KE", "KG", "KH", "KI", "KM", "KN", "KP", "KR", "KW", "KY", "KZ", "LA", "LB", "LC",
    "LI", "LK", "LR", "LS", "LT", "LU", "LV", "LY", "MA", "MC", "MD", "ME", "MF", "MG", "MH", "MK",
    "ML", "MM", "MN", "MO", "MP", "MQ", "MR", "MS", "MT", "MU", "MV", "MW", "MX", "MY", "MZ", "NA",
    "NC", "NE", "NF", "NG", "NI", "NL", "NO", "NP", "NR", "NU", "NZ", "OM", "PA", "PE", "PF", "PG",
    "PH", "PK", "PL", "PM", "PN", "PR", "PS", "PT", "PW", "PY", "QA", "RE", "RO", "RS", "RU", "RW",
    "SA", "SB", "SC", "SD", "SE", "SG", "SH", "SI", "SJ", "SK", "SL", "SM", "SN", "SO", "SR", "SS",
    "ST", "SV", "SX", "SY", "SZ", "TC", "TD", "TF", "TG", "TH", "TJ", "TK", "TL", "TM", "TN", "TO",
    "TR", "TT", "TV", "TW", "TZ", "UA", "UG", "UM", "US", "UY", "UZ", "VA", "VC", "VE", "VG", "VI",
    "VN", "VU", "WF", "WS", "YE", "YT", "ZA", "ZM", "ZW",
];

const US_STATES: &[(&str, &str)] = &[
    ("AL", "Alabama"),
    ("AK", "Alaska"),
    ("AZ", "Arizona"),
    ("AR", "Arkansas"),
    ("CA", "California"),
    ("CO", "Colorado"),
    ("CT", "Connecticut"),
    ("DE", "Delaware"),
    ("DC", "District of Columbia"),
    ("FL", "Florida"),
    ("GA", "Georgia"),
    ("HI", "Hawaii"),
    ("ID", "Idaho"),
    ("IL", "Illinois"),
    ("IN", "Indiana"),
    ("IA", "Iowa"),
    ("KS", "Kansas"),
    ("KY", "Kentucky"),
    ("LA", "Louisiana"),
    ("ME", "Maine"),
    ("MD", "Maryland"),
    ("MA", "Massachusetts"),
    ("MI", "Michigan"),
    ("MN", "Minnesota"),
    ("MS", "Mississippi"),
    ("MO", "Missouri"),
    ("MT", "Montana"),
    ("NE", "Nebraska"),
    ("NV", "Nevada"),
    ("NH", "New Hampshire"),
    ("NJ", "New Jersey"),
    ("NM", "New Mexico"),
    ("NY", "New York"),
    ("NC", "North Carolina"),
    ("ND", "North Dakota"),
    ("OH", "Ohio"),
    ("OK", "Oklahoma"),
    ("OR", "Oregon"),
    ("PA", "Pennsylvania"),
    ("RI", "Rhode Island"),
    ("SC", "South Carolina"),
    ("SD", "South Dakota"),
    ("TN", "Tennessee"),
    ("TX", "Texas"),
    ("UT", "Utah"),
    ("VT", "Vermont"),
    ("VA", "Virginia"),
    ("WA", "Washington"),
    ("WV", "West Virginia"),
    ("WI", "Wisconsin"),
    ("WY", "Wyoming"),
];

/// One independently extracted region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Geography {
    /// Code used in the fetch locator: `FR`, `US_New_York`.
    pub code: String,
    pub category: Category,
    /// Directory name of the stored record: `FR`, `NY`.
    pub record_key: String,
}

impl fmt::Display for Geography {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

impl Geography {
    pub fn country(code: &str) -> Self {
        Geography {
            code: code.to_string(),
            category: Category::Country,
            record_key: code.to_string(),
        }
    }

    pub fn state(abbrev: &str, name: &str) -> Self {
        Geography {
            code: format!("US_{}", name.replace(' ', "_")),
            category: Category::State,
            record_key: abbrev.to_string(),
        }
    }

    pub fn fetch_url(&self, base_url: &str, vintage: NaiveDate) -> String {
        format!(
            "{}/{}_{}_Mobility_Report_en.pdf",
            base_url.trim_end_matches('/'),
            vintage.format("%Y-%m-%d"),
            self.code
        )
    }

    /// Where the downloaded report lives inside a vintage directory.
    pub fn document_path(&self, vintage_dir: &Path) -> PathBuf {
        vintage_dir.join(&self.code).join("mobility.pdf")
    }

    /// Directory of the stored record: `<root>/FR` or `<root>/US/NY`.
    pub fn record_dir(&self, output_dir: &Path) -> PathBuf {
        match self.category {
            Category::Country => output_dir.join(&self.record_key),
            Category::State => output_dir.join("US").join(&self.record_key),
        }
    }

    /// Accepts a country code (`fr`), a state fetch code (`US_New_York`) or `US-NY`.
    pub fn resolve(input: &str) -> Option<Geography> {
        let input = input.trim();
        if let Some(abbrev) = input.strip_prefix("US-").or_else(|| input.strip_prefix("us-")) {
            return US_STATES
                .iter()
                .find(|(a, _)| a.eq_ignore_ascii_case(abbrev))
                .map(|(a, n)| Geography::state(a, n));
        }
        if let Some(name) = input.strip_prefix("US_") {
            let name = name.replace('_', " ");
            return US_STATES
                .iter()
                .find(|(_, n)| n.eq_ignore_ascii_case(&name))
                .map(|(a, n)| Geography::state(a, n));
        }
        COUNTRY_CODES
            .iter()
            .find(|c| c.eq_ignore_ascii_case(input))
            .map(|c| Geography::country(c))
    }
}

pub fn countries() -> Vec<Geography> {
    COUNTRY_CODES.iter().map(|c| Geography::country(c)).collect()
}

pub fn us_states() -> Vec<Geography> {
    US_STATES.iter().map(|(a, n)| Geography::state(a, n)).collect()
}
