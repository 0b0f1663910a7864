use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const PROVINCE_PATTERN: &str = "北京|天津|上海|重庆|河北|山西|辽宁|吉林|黑龙江|江苏|浙江|安徽|福建|江西|山东|河南|湖北|湖南|广东|海南|四川|贵州|云南|陕西|甘肃|青海|台湾|内蒙古|广西|西藏|宁夏|新疆|香港|澳门";

static PROVINCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("({})", PROVINCE_PATTERN)).expect("static regex is valid"));
static CITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(.+?市)").expect("static regex is valid"));
static DISTRICT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.+?[区县])").expect("static regex is valid"));

/// Province / city / district read from a single address string.
///
/// Each level is a shortest-prefix match from the start of the string, so the
/// city and district carry every level above them ("广东省广州市" for the city
/// of "广东省广州市天河区"). Addresses that list levels out of order are
/// mis-assigned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub province: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
}

pub fn parse_region(text: &str) -> Region {
    if text.trim().is_empty() {
        return Region::default();
    }
    Region {
        province: first_capture(&PROVINCE, text),
        city: first_capture(&CITY, text),
        district: first_capture(&DISTRICT, text),
    }
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).map(|c| c[1].to_string())
}

/// Every province named in the text, in order of appearance, without repeats
pub fn provinces_in(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in PROVINCE.find_iter(text) {
        if !found.iter().any(|p| p == m.as_str()) {
            found.push(m.as_str().to_string());
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_address() {
        let region = parse_region("广东省广州市天河区");
        assert_eq!(region.province.as_deref(), Some("广东"));
        assert_eq!(region.city.as_deref(), Some("广东省广州市"));
        assert_eq!(region.district.as_deref(), Some("广东省广州市天河区"));
    }

    #[test]
    fn test_partial_address() {
        let region = parse_region("北京市");
        assert_eq!(region.province.as_deref(), Some("北京"));
        assert_eq!(region.city.as_deref(), Some("北京市"));
        assert_eq!(region.district, None);
        assert_eq!(parse_region(""), Region::default());
    }

    #[test]
    fn test_provinces_in() {
        assert_eq!(
            provinces_in("限江苏、浙江或江苏籍生源"),
            vec!["江苏".to_string(), "浙江".to_string()]
        );
    }
}
