//! Stock and price extraction from raw page markup.

use common::config::ProductConfig;
use common::{Error, Observation};
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

/// A configured product with its patterns compiled.
#[derive(Debug, Clone)]
pub struct ProductSpec {
    pub name: String,
    pub url: String,
    pub stock_pattern: Option<Regex>,
    pub price_pattern: Option<Regex>,
}

impl ProductSpec {
    pub fn compile(cfg: &ProductConfig) -> Result<Self, Error> {
        let compile = |raw: &Option<String>, field: &str| -> Result<Option<Regex>, Error> {
            match raw.as_deref().map(str::trim) {
                None | Some("") => Ok(None),
                Some(p) => compile_pattern(p).map(Some).map_err(|e| {
                    Error::Config(format!("products[{}].{}: {}", cfg.name, field, e))
                }),
            }
        };

        Ok(Self {
            name: cfg.name.clone(),
            url: cfg.url.clone(),
            stock_pattern: compile(&cfg.stock_pattern, "stock_pattern")?,
            price_pattern: compile(&cfg.price_pattern, "price_pattern")?,
        })
    }

    pub fn extract(&self, html: &str) -> Result<Observation, Error> {
        extract(html, self.stock_pattern.as_ref(), self.price_pattern.as_ref())
    }
}

/// Patterns always match case-insensitively.
pub fn compile_pattern(raw: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(raw).case_insensitive(true).build()
}

/// Compile every product, rejecting duplicate names.
pub fn compile_products(products: &[ProductConfig]) -> Result<Vec<ProductSpec>, Error> {
    let mut seen = HashSet::new();
    let mut specs = Vec::with_capacity(products.len());
    for cfg in products {
        if !seen.insert(cfg.name.as_str()) {
            return Err(Error::Config(format!("duplicate product name: {}", cfg.name)));
        }
        specs.push(ProductSpec::compile(cfg)?);
    }
    Ok(specs)
}

/// Pull stock and price out of `html`. A pattern that is absent or does not
/// match yields `None`; a match whose first group is not a usable number is
/// an `Error::Extract`.
pub fn extract(
    html: &str,
    stock_pattern: Option<&Regex>,
    price_pattern: Option<&Regex>,
) -> Result<Observation, Error> {
    let stock = match stock_pattern {
        Some(re) => first_capture(re, html, "stock")?
            .map(parse_stock)
            .transpose()?,
        None => None,
    };
    let price = match price_pattern {
        Some(re) => first_capture(re, html, "price")?
            .map(parse_price)
            .transpose()?,
        None => None,
    };
    Ok(Observation { stock, price })
}

fn first_capture<'h>(
    re: &Regex,
    html: &'h str,
    field: &'static str,
) -> Result<Option<&'h str>, Error> {
    let Some(caps) = re.captures(html) else {
        return Ok(None);
    };
    if re.captures_len() < 2 {
        return Err(Error::Extract {
            field,
            message: format!("pattern `{}` has no capture group", re.as_str()),
        });
    }
    match caps.get(1) {
        Some(m) => Ok(Some(m.as_str())),
        None => Err(Error::Extract {
            field,
            message: format!("pattern `{}` matched without its first group", re.as_str()),
        }),
    }
}

/// Zero code points of the non-ASCII decimal digit runs storefronts use.
/// Each run holds ten consecutive digits.
const DIGIT_ZEROS: &[u32] = &[
    0xFF10, // fullwidth
    0x0660, // Arabic-Indic
    0x06F0, // extended Arabic-Indic
    0x0966, // Devanagari
    0x09E6, // Bengali
    0x0E50, // Thai
];

fn ascii_digit(c: char) -> Option<char> {
    let cp = c as u32;
    DIGIT_ZEROS
        .iter()
        .find(|&&zero| (zero..zero + 10).contains(&cp))
        .and_then(|&zero| char::from_digit(cp - zero, 10))
}

/// Fold digits and punctuation to ASCII, then drop well-formed thousands
/// separators. Returns `None` when commas appear anywhere else.
fn normalize_number(raw: &str) -> Option<String> {
    let folded: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '，' => ',',
            '．' => '.',
            _ => ascii_digit(c).unwrap_or(c),
        })
        .collect();

    if !folded.contains(',') {
        return Some(folded);
    }
    is_grouped(&folded).then(|| folded.replace(',', ""))
}

/// `1,234` or `12,345,678.90`: one to three leading digits, then groups of three.
fn is_grouped(s: &str) -> bool {
    let (int_part, frac) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s, None),
    };
    let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());

    let mut groups = int_part.split(',');
    let head_ok = groups
        .next()
        .is_some_and(|g| all_digits(g) && g.len() <= 3);
    head_ok
        && groups.all(|g| all_digits(g) && g.len() == 3)
        && frac.map_or(true, all_digits)
}

fn parse_stock(raw: &str) -> Result<u64, Error> {
    normalize_number(raw)
        .and_then(|n| n.parse::<u64>().ok())
        .ok_or_else(|| Error::Extract {
            field: "stock",
            message: format!("`{}` is not a non-negative integer", raw),
        })
}

fn parse_price(raw: &str) -> Result<f64, Error> {
    match normalize_number(raw).and_then(|n| n.parse::<f64>().ok()) {
        Some(p) if p.is_finite() && p >= 0.0 => Ok(p),
        _ => Err(Error::Extract {
            field: "price",
            message: format!("`{}` is not a non-negative number", raw),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STOCK: &str = r"库存\((\d+)\)";
    const PRICE: &str = r"¥\s*(\d+\.?\d*)";

    fn product(stock: Option<&str>, price: Option<&str>) -> ProductConfig {
        ProductConfig {
            name: "商品1".into(),
            url: "https://example.com/product1".into(),
            stock_pattern: stock.map(String::from),
            price_pattern: price.map(String::from),
        }
    }

    #[test]
    fn test_extracts_stock_and_price() {
        let spec = ProductSpec::compile(&product(Some(STOCK), Some(PRICE))).unwrap();
        let obs = spec
            .extract("<div>库存(5)</div><span>¥ 19.99</span>")
            .unwrap();
        assert_eq!(obs, Observation::new(Some(5), Some(19.99)));
    }

    #[test]
    fn test_missing_patterns_yield_none() {
        let spec = ProductSpec::compile(&product(None, Some("  "))).unwrap();
        assert!(spec.stock_pattern.is_none());
        assert!(spec.price_pattern.is_none());
        assert!(spec.extract("库存(5) ¥1").unwrap().is_empty());
    }

    #[test]
    fn test_no_match_is_not_an_error() {
        let spec = ProductSpec::compile(&product(Some(STOCK), Some(PRICE))).unwrap();
        let obs = spec.extract("<html>sold out</html>").unwrap();
        assert!(obs.is_empty());
    }

    #[test]
    fn test_case_insensitive_match() {
        let re = compile_pattern(r"stock:\s*(\d+)").unwrap();
        let obs = extract("STOCK: 12", Some(&re), None).unwrap();
        assert_eq!(obs.stock, Some(12));
    }

    #[test]
    fn test_first_match_wins() {
        let re = compile_pattern(PRICE).unwrap();
        let obs = extract("¥10.5 ... ¥99", None, Some(&re)).unwrap();
        assert_eq!(obs.price, Some(10.5));
    }

    #[test]
    fn test_non_numeric_capture_is_extract_error() {
        let re = compile_pattern(r"stock:\s*(\w+)").unwrap();
        let err = extract("stock: many", Some(&re), None).unwrap_err();
        match err {
            Error::Extract { field, .. } => assert_eq!(field, "stock"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_pattern_without_group_is_extract_error() {
        let re = compile_pattern(r"in stock").unwrap();
        let err = extract("In Stock", Some(&re), None).unwrap_err();
        assert_eq!(err.kind(), "extract");
    }

    #[test]
    fn test_thousands_separator_is_accepted() {
        let re = compile_pattern(r"price:\s*([\d,\.]+)").unwrap();
        let obs = extract("price: 1,299.50", None, Some(&re)).unwrap();
        assert_eq!(obs.price, Some(1299.5));
    }

    #[test]
    fn test_decimal_comma_is_extract_error() {
        let price = compile_pattern(r"价格:\s*([\d,]+)").unwrap();
        let err = extract("价格: 19,99", None, Some(&price)).unwrap_err();
        match err {
            Error::Extract { field, .. } => assert_eq!(field, "price"),
            other => panic!("unexpected error: {other}"),
        }

        let stock = compile_pattern(r"stock:\s*([\d,]+)").unwrap();
        let err = extract("stock: 1,2", Some(&stock), None).unwrap_err();
        assert_eq!(err.kind(), "extract");
    }

    #[test]
    fn test_grouping_rules() {
        assert!(is_grouped("1,234"));
        assert!(is_grouped("12,345,678.90"));
        assert!(!is_grouped("1234,567"));
        assert!(!is_grouped("1,23"));
        assert!(!is_grouped(",123"));
        assert!(!is_grouped("1,234."));
    }

    #[test]
    fn test_fullwidth_digits_are_parsed() {
        let stock = compile_pattern(STOCK).unwrap();
        let price = compile_pattern(PRICE).unwrap();
        let obs = extract("库存(５) ¥１９．９９", Some(&stock), Some(&price)).unwrap();
        assert_eq!(obs, Observation::new(Some(5), Some(19.99)));
    }

    #[test]
    fn test_fullwidth_thousands_separator() {
        let stock = compile_pattern(r"库存:\s*([\d，]+)").unwrap();
        let obs = extract("库存: １，２００", Some(&stock), None).unwrap();
        assert_eq!(obs.stock, Some(1200));
    }

    #[test]
    fn test_extract_is_pure() {
        let stock = compile_pattern(STOCK).unwrap();
        let price = compile_pattern(PRICE).unwrap();
        let html = "库存(8) ¥7";
        let first = extract(html, Some(&stock), Some(&price)).unwrap();
        let second = extract(html, Some(&stock), Some(&price)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_regex_is_config_error() {
        let err = ProductSpec::compile(&product(Some(r"库存\((\d+"), None)).unwrap_err();
        assert_eq!(err.kind(), "config");
        assert!(err.to_string().contains("stock_pattern"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let p = product(Some(STOCK), None);
        let err = compile_products(&[p.clone(), p]).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }
}
