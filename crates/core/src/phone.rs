//! Phone number screening and normalization.
//!
//! Free-text phone numbers arrive from chat messages and shared contacts, so the
//! input is screened before any parsing happens:
//!
//! - length must be within [`MIN_INPUT_LEN`]..=[`MAX_INPUT_LEN`] characters
//! - only digits, `+`, `(`, `)`, `-`, `.` and spaces are accepted
//!
//! Parsing first tries the international form (`+` or `00` prefix), then the
//! configured default region, then falls back to reading the digits as an
//! international number without a prefix. A number is accepted when it is
//! *possible* for its region (an admissible length); the stricter *valid* check is
//! reported separately for callers that need it.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const MIN_INPUT_LEN: usize = 10;
pub const MAX_INPUT_LEN: usize = 50;
pub const DEFAULT_REGION: &str = "US";

const MIN_E164_DIGITS: usize = 7;
const MAX_E164_DIGITS: usize = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhoneNumberType {
    Mobile,
    FixedLine,
    FixedLineOrMobile,
    TollFree,
    PremiumRate,
    Voip,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhoneFormat {
    E164,
    International,
    National,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhoneRejection {
    TooShort,
    TooLong,
    ForbiddenCharacters,
    Unparseable,
    NotPossible,
}

impl PhoneRejection {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::TooShort => "That phone number is too short. Please include the full number.",
            Self::TooLong => "That phone number is too long. Please send just the number.",
            Self::ForbiddenCharacters => {
                "Phone numbers may only contain digits, spaces, and + ( ) - . characters."
            }
            Self::Unparseable | Self::NotPossible => {
                "That doesn't look like a valid phone number. Please check it and try again."
            }
        }
    }
}

impl fmt::Display for PhoneRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::TooShort => "input shorter than minimum length",
            Self::TooLong => "input longer than maximum length",
            Self::ForbiddenCharacters => "input contains characters outside the allow-list",
            Self::Unparseable => "input could not be parsed as a phone number",
            Self::NotPossible => "number length is not possible for its region",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneValidationResult {
    pub e164: String,
    pub is_possible: bool,
    pub is_valid: bool,
    pub country_code: u16,
    pub region: Option<String>,
    pub number_type: PhoneNumberType,
    pub national_format: String,
    pub international_format: String,
}

impl PhoneValidationResult {
    pub fn format(&self, format: PhoneFormat) -> &str {
        match format {
            PhoneFormat::E164 => &self.e164,
            PhoneFormat::International => &self.international_format,
            PhoneFormat::National => &self.national_format,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FormatStyle {
    Nanp,
    Grouped,
}

struct RegionMetadata {
    region: &'static str,
    calling_code: u16,
    trunk_prefix: Option<char>,
    possible_lengths: &'static [usize],
    style: FormatStyle,
    /// `Some(type)` when the national number matches a valid pattern.
    classify: fn(&str) -> Option<PhoneNumberType>,
    groups: fn(&str) -> &'static [usize],
}

impl RegionMetadata {
    fn is_possible(&self, national: &str) -> bool {
        self.possible_lengths.contains(&national.len())
    }

    /// National significant numbers in `0` trunk regions never start with `0`, so a
    /// leading `0` is always the trunk digit. The NANP `1` is only a trunk digit when
    /// the full string is too long to be a national number.
    fn strip_trunk<'a>(&self, digits: &'a str) -> &'a str {
        match self.trunk_prefix {
            Some('0') => digits.strip_prefix('0').unwrap_or(digits),
            Some(prefix) if digits.starts_with(prefix) && !self.is_possible(digits) => &digits[1..],
            _ => digits,
        }
    }
}

static REGIONS: &[RegionMetadata] = &[
    RegionMetadata {
        region: "US",
        calling_code: 1,
        trunk_prefix: Some('1'),
        possible_lengths: &[10],
        style: FormatStyle::Nanp,
        classify: classify_nanp,
        groups: groups_nanp,
    },
    RegionMetadata {
        region: "GB",
        calling_code: 44,
        trunk_prefix: Some('0'),
        possible_lengths: &[9, 10],
        style: FormatStyle::Grouped,
        classify: classify_gb,
        groups: groups_gb,
    },
    RegionMetadata {
        region: "IE",
        calling_code: 353,
        trunk_prefix: Some('0'),
        possible_lengths: &[7, 8, 9],
        style: FormatStyle::Grouped,
        classify: classify_ie,
        groups: groups_ie,
    },
    RegionMetadata {
        region: "FR",
        calling_code: 33,
        trunk_prefix: Some('0'),
        possible_lengths: &[9],
        style: FormatStyle::Grouped,
        classify: classify_fr,
        groups: groups_fr,
    },
    RegionMetadata {
        region: "DE",
        calling_code: 49,
        trunk_prefix: Some('0'),
        possible_lengths: &[7, 8, 9, 10, 11],
        style: FormatStyle::Grouped,
        classify: classify_de,
        groups: groups_de,
    },
    RegionMetadata {
        region: "ES",
        calling_code: 34,
        trunk_prefix: None,
        possible_lengths: &[9],
        style: FormatStyle::Grouped,
        classify: classify_es,
        groups: groups_es,
    },
    RegionMetadata {
        region: "NL",
        calling_code: 31,
        trunk_prefix: Some('0'),
        possible_lengths: &[9],
        style: FormatStyle::Grouped,
        classify: classify_nl,
        groups: groups_nl,
    },
    RegionMetadata {
        region: "AU",
        calling_code: 61,
        trunk_prefix: Some('0'),
        possible_lengths: &[9],
        style: FormatStyle::Grouped,
        classify: classify_au,
        groups: groups_au,
    },
    RegionMetadata {
        region: "IN",
        calling_code: 91,
        trunk_prefix: Some('0'),
        possible_lengths: &[10],
        style: FormatStyle::Grouped,
        classify: classify_in,
        groups: groups_in,
    },
];

fn region_by_code(region: &str) -> Option<&'static RegionMetadata> {
    REGIONS.iter().find(|meta| meta.region.eq_ignore_ascii_case(region.trim()))
}

fn region_by_calling_code(calling_code: u16) -> Option<&'static RegionMetadata> {
    REGIONS.iter().find(|meta| meta.calling_code == calling_code)
}

pub fn is_supported_region(region: &str) -> bool {
    region_by_code(region).is_some()
}

/// Validates and normalizes free-text phone numbers against a default region.
#[derive(Clone, Copy)]
pub struct PhoneNormalizer {
    default_region: &'static RegionMetadata,
}

impl fmt::Debug for PhoneNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhoneNormalizer")
            .field("default_region", &self.default_region.region)
            .finish()
    }
}

impl Default for PhoneNormalizer {
    fn default() -> Self {
        Self { default_region: &REGIONS[0] }
    }
}

impl PhoneNormalizer {
    /// Returns `None` when the region has no metadata.
    pub fn for_region(region: &str) -> Option<Self> {
        region_by_code(region).map(|default_region| Self { default_region })
    }

    pub fn default_region(&self) -> &'static str {
        self.default_region.region
    }

    pub fn looks_like_phone_number(&self, text: &str) -> bool {
        if screen(text).is_err() {
            return false;
        }
        let digit_count = text.chars().filter(char::is_ascii_digit).count();
        (MIN_E164_DIGITS..=MAX_E164_DIGITS + 2).contains(&digit_count)
            && self.parse(text).is_ok()
    }

    pub fn normalize(&self, text: &str) -> Option<String> {
        self.parse(text).ok().map(|parsed| parsed.e164())
    }

    pub fn validate_for_linking(&self, text: &str) -> Result<String, PhoneRejection> {
        self.parse(text).map(|parsed| parsed.e164())
    }

    pub fn info(&self, text: &str) -> Option<PhoneValidationResult> {
        let parsed = self.parse(text).ok()?;
        let (national_format, international_format) = parsed.display_formats();
        let number_type = parsed.number_type();
        Some(PhoneValidationResult {
            e164: parsed.e164(),
            is_possible: true,
            is_valid: number_type.is_some(),
            country_code: parsed.calling_code,
            region: parsed.metadata.map(|meta| meta.region.to_owned()),
            number_type: number_type.unwrap_or(PhoneNumberType::Unknown),
            national_format,
            international_format,
        })
    }

    pub fn is_mobile(&self, text: &str) -> bool {
        self.info(text).is_some_and(|info| {
            matches!(info.number_type, PhoneNumberType::Mobile | PhoneNumberType::FixedLineOrMobile)
        })
    }

    pub fn format_for_display(&self, text: &str, format: PhoneFormat) -> Option<String> {
        self.info(text).map(|info| info.format(format).to_owned())
    }

    fn parse(&self, text: &str) -> Result<ParsedNumber, PhoneRejection> {
        screen(text)?;
        let trimmed = text.trim();
        if trimmed.char_indices().any(|(index, ch)| ch == '+' && index != 0) {
            return Err(PhoneRejection::Unparseable);
        }

        let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(PhoneRejection::Unparseable);
        }

        let parsed = if trimmed.starts_with('+') {
            parse_international(&digits)?
        } else if let Some(rest) = digits.strip_prefix("00") {
            parse_international(rest)?
        } else {
            match parse_national(self.default_region, &digits) {
                Some(parsed) => parsed,
                None => parse_international(&digits)?,
            }
        };

        // Shorter results could not be fed back through `screen`.
        if parsed.e164().len() < MIN_INPUT_LEN {
            return Err(PhoneRejection::NotPossible);
        }
        Ok(parsed)
    }
}

fn screen(text: &str) -> Result<(), PhoneRejection> {
    let length = text.chars().count();
    if length < MIN_INPUT_LEN {
        return Err(PhoneRejection::TooShort);
    }
    if length > MAX_INPUT_LEN {
        return Err(PhoneRejection::TooLong);
    }
    let allowed = |ch: char| ch.is_ascii_digit() || matches!(ch, '+' | '(' | ')' | '-' | '.' | ' ');
    if !text.chars().all(allowed) {
        return Err(PhoneRejection::ForbiddenCharacters);
    }
    Ok(())
}

struct ParsedNumber {
    calling_code: u16,
    national: String,
    metadata: Option<&'static RegionMetadata>,
}

impl ParsedNumber {
    fn e164(&self) -> String {
        format!("+{}{}", self.calling_code, self.national)
    }

    fn number_type(&self) -> Option<PhoneNumberType> {
        self.metadata.and_then(|meta| (meta.classify)(&self.national))
    }

    fn display_formats(&self) -> (String, String) {
        let Some(meta) = self.metadata else {
            return (self.national.clone(), format!("+{} {}", self.calling_code, self.national));
        };

        let groups = split_groups(&self.national, (meta.groups)(&self.national));
        match meta.style {
            FormatStyle::Nanp if groups.len() == 3 => (
                format!("({}) {}-{}", groups[0], groups[1], groups[2]),
                format!("+{} {}-{}-{}", self.calling_code, groups[0], groups[1], groups[2]),
            ),
            _ => {
                let spaced = groups.join(" ");
                let national = match meta.trunk_prefix {
                    Some('0') => format!("0{spaced}"),
                    _ => spaced.clone(),
                };
                (national, format!("+{} {spaced}", self.calling_code))
            }
        }
    }
}

fn parse_national(meta: &'static RegionMetadata, digits: &str) -> Option<ParsedNumber> {
    let national = meta.strip_trunk(digits);
    meta.is_possible(national).then(|| ParsedNumber {
        calling_code: meta.calling_code,
        national: national.to_owned(),
        metadata: Some(meta),
    })
}

fn parse_international(digits: &str) -> Result<ParsedNumber, PhoneRejection> {
    if digits.len() < MIN_E164_DIGITS || digits.len() > MAX_E164_DIGITS {
        return Err(PhoneRejection::NotPossible);
    }
    let code_len = calling_code_length(digits).ok_or(PhoneRejection::Unparseable)?;
    let calling_code = digits[..code_len].parse::<u16>().map_err(|_| PhoneRejection::Unparseable)?;
    let rest = &digits[code_len..];

    match region_by_calling_code(calling_code) {
        Some(meta) => {
            // "+44 (0)7911 ..." style input keeps the trunk digit.
            let national = match meta.trunk_prefix {
                Some('0') => meta.strip_trunk(rest),
                _ => rest,
            };
            if !meta.is_possible(national) {
                return Err(PhoneRejection::NotPossible);
            }
            Ok(ParsedNumber { calling_code, national: national.to_owned(), metadata: Some(meta) })
        }
        None if rest.len() >= 4 => {
            Ok(ParsedNumber { calling_code, national: rest.to_owned(), metadata: None })
        }
        None => Err(PhoneRejection::NotPossible),
    }
}

/// Length of the country calling code at the start of `digits`, following the
/// ITU assignment structure (zone 1 and 7 are single digit, a fixed set of two-digit
/// codes, everything else three digits).
fn calling_code_length(digits: &str) -> Option<usize> {
    let bytes = digits.as_bytes();
    match bytes.first()? {
        b'0' => None,
        b'1' | b'7' => Some(1),
        _ => {
            let two = digits.get(..2)?.parse::<u16>().ok()?;
            let two_digit = matches!(
                two,
                20 | 27
                    | 30..=34
                    | 36
                    | 39
                    | 40
                    | 41
                    | 43..=49
                    | 51..=58
                    | 60..=66
                    | 81
                    | 82
                    | 84
                    | 86
                    | 90..=95
                    | 98
            );
            Some(if two_digit { 2 } else { 3 })
        }
    }
}

fn split_groups<'a>(national: &'a str, sizes: &[usize]) -> Vec<&'a str> {
    let mut groups = Vec::with_capacity(sizes.len() + 1);
    let mut start = 0;
    for size in sizes {
        if start >= national.len() {
            break;
        }
        let end = (start + size).min(national.len());
        groups.push(&national[start..end]);
        start = end;
    }
    if start < national.len() {
        groups.push(&national[start..]);
    }
    groups
}

fn groups_nanp(_national: &str) -> &'static [usize] {
    &[3, 3, 4]
}

fn groups_ie(national: &str) -> &'static [usize] {
    if national.len() == 9 {
        &[2, 3, 4]
    } else {
        &[1, 3, 4]
    }
}

fn groups_fr(_national: &str) -> &'static [usize] {
    &[1, 2, 2, 2, 2]
}

fn groups_de(_national: &str) -> &'static [usize] {
    &[3, 8]
}

fn groups_es(_national: &str) -> &'static [usize] {
    &[3, 2, 2, 2]
}

fn groups_nl(national: &str) -> &'static [usize] {
    if national.starts_with('6') {
        &[1, 8]
    } else {
        &[2, 7]
    }
}

fn groups_au(national: &str) -> &'static [usize] {
    if national.starts_with('4') {
        &[3, 3, 3]
    } else {
        &[1, 4, 4]
    }
}

fn groups_in(_national: &str) -> &'static [usize] {
    &[5, 5]
}

fn digit_at(national: &str, index: usize) -> Option<u8> {
    national.as_bytes().get(index).map(|byte| byte - b'0')
}

fn classify_nanp(national: &str) -> Option<PhoneNumberType> {
    if national.len() != 10 {
        return None;
    }
    let area_ok = digit_at(national, 0)? >= 2 && !national[1..3].eq("11");
    let exchange_ok = digit_at(national, 3)? >= 2;
    // 555-0100 through 555-0199 is reserved for fiction.
    let fictional = &national[3..6] == "555" && &national[6..8] == "01";
    if !area_ok || !exchange_ok || fictional {
        return None;
    }
    match &national[..3] {
        "800" | "833" | "844" | "855" | "866" | "877" | "888" => Some(PhoneNumberType::TollFree),
        "900" => Some(PhoneNumberType::PremiumRate),
        _ => Some(PhoneNumberType::FixedLineOrMobile),
    }
}

fn classify_gb(national: &str) -> Option<PhoneNumberType> {
    let len = national.len();
    match (digit_at(national, 0)?, digit_at(national, 1)?) {
        (7, 0) if len == 10 => Some(PhoneNumberType::Voip),
        (7, 6) if len == 10 => None,
        (7, _) if len == 10 => Some(PhoneNumberType::Mobile),
        (1, _) if len == 9 || len == 10 => Some(PhoneNumberType::FixedLine),
        (2, _) | (3, _) if len == 10 => Some(PhoneNumberType::FixedLine),
        (8, 0) if len == 9 || len == 10 => Some(PhoneNumberType::TollFree),
        (9, _) if len == 10 => Some(PhoneNumberType::PremiumRate),
        (5, 6) if len == 10 => Some(PhoneNumberType::Voip),
        _ => None,
    }
}

fn groups_gb(national: &str) -> &'static [usize] {
    match (national.as_bytes().first(), national.len()) {
        (Some(b'2'), _) => &[2, 4, 4],
        (Some(b'8'), _) => &[3, 3, 4],
        (_, 9) => &[4, 5],
        _ => &[4, 6],
    }
}

fn classify_ie(national: &str) -> Option<PhoneNumberType> {
    match (digit_at(national, 0)?, digit_at(national, 1)?, national.len()) {
        (8, 3 | 5..=9, 9) => Some(PhoneNumberType::Mobile),
        (1, 8, _) => Some(PhoneNumberType::TollFree),
        (1..=9, _, 7..=9) => Some(PhoneNumberType::FixedLine),
        _ => None,
    }
}

fn classify_fr(national: &str) -> Option<PhoneNumberType> {
    match digit_at(national, 0)? {
        6 | 7 => Some(PhoneNumberType::Mobile),
        1..=5 => Some(PhoneNumberType::FixedLine),
        8 => Some(PhoneNumberType::TollFree),
        9 => Some(PhoneNumberType::Voip),
        _ => None,
    }
}

fn classify_de(national: &str) -> Option<PhoneNumberType> {
    match (digit_at(national, 0)?, digit_at(national, 1)?, national.len()) {
        (1, 5..=7, 10 | 11) => Some(PhoneNumberType::Mobile),
        (8, 0, _) => Some(PhoneNumberType::TollFree),
        (2..=9, _, _) => Some(PhoneNumberType::FixedLine),
        _ => None,
    }
}

fn classify_es(national: &str) -> Option<PhoneNumberType> {
    match digit_at(national, 0)? {
        6 | 7 => Some(PhoneNumberType::Mobile),
        8 | 9 => Some(PhoneNumberType::FixedLine),
        _ => None,
    }
}

fn classify_nl(national: &str) -> Option<PhoneNumberType> {
    match digit_at(national, 0)? {
        6 => Some(PhoneNumberType::Mobile),
        1..=5 | 7 => Some(PhoneNumberType::FixedLine),
        _ => None,
    }
}

fn classify_au(national: &str) -> Option<PhoneNumberType> {
    match digit_at(national, 0)? {
        4 => Some(PhoneNumberType::Mobile),
        2 | 3 | 7 | 8 => Some(PhoneNumberType::FixedLine),
        _ => None,
    }
}

fn classify_in(national: &str) -> Option<PhoneNumberType> {
    match digit_at(national, 0)? {
        6..=9 => Some(PhoneNumberType::Mobile),
        1..=5 => Some(PhoneNumberType::FixedLine),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        PhoneFormat, PhoneNormalizer, PhoneNumberType, PhoneRejection, MAX_INPUT_LEN,
    };

    fn us() -> PhoneNormalizer {
        PhoneNormalizer::default()
    }

    fn gb() -> PhoneNormalizer {
        PhoneNormalizer::for_region("gb").expect("gb metadata")
    }

    fn is_e164(value: &str) -> bool {
        let Some(digits) = value.strip_prefix('+') else {
            return false;
        };
        (7..=15).contains(&digits.len()) && digits.bytes().all(|byte| byte.is_ascii_digit())
    }

    #[test]
    fn us_style_number_normalizes_with_default_region() {
        let normalizer = us();
        assert_eq!(normalizer.normalize("202-555-0123").as_deref(), Some("+12025550123"));

        let info = normalizer.info("202-555-0123").expect("possible number");
        assert!(info.is_possible);
        assert!(!info.is_valid, "555-01xx is reserved for fiction");
        assert_eq!(info.country_code, 1);
        assert_eq!(info.national_format, "(202) 555-0123");
        assert_eq!(info.international_format, "+1 202-555-0123");
    }

    #[test]
    fn gb_mobile_accepts_trunk_prefix_and_international_forms() {
        let normalizer = gb();
        for input in ["07911 123456", "+44 7911 123456", "0044 7911 123456", "+44 (0)7911 123456"] {
            assert_eq!(
                normalizer.normalize(input).as_deref(),
                Some("+447911123456"),
                "input `{input}`"
            );
        }
        assert!(normalizer.is_mobile("07911 123456"));
        assert_eq!(
            normalizer.format_for_display("07911123456", PhoneFormat::National).as_deref(),
            Some("07911 123456")
        );
        assert_eq!(
            normalizer.format_for_display("07911123456", PhoneFormat::International).as_deref(),
            Some("+44 7911 123456")
        );
    }

    #[test]
    fn trunk_zero_is_stripped_even_when_raw_length_is_possible() {
        let cases = [
            ("IE", "01 234 5678", "+353 1 234 5678", "+35312345678"),
            ("DE", "030 1234567", "+49 30 1234567", "+49301234567"),
            ("GB", "01204 12345", "+44 1204 12345", "+44120412345"),
        ];

        for (region, national, international, e164) in cases {
            let normalizer = PhoneNormalizer::for_region(region).expect("region");
            assert_eq!(normalizer.normalize(national).as_deref(), Some(e164), "`{national}`");
            assert_eq!(normalizer.normalize(international).as_deref(), Some(e164), "`{international}`");
            assert_eq!(normalizer.validate_for_linking(national).as_deref(), Ok(e164));
            assert!(normalizer.info(national).expect("info").is_valid, "`{national}` in {region}");
        }

        let ie = PhoneNormalizer::for_region("IE").expect("ie");
        assert_eq!(ie.normalize("+353 (0)1 234 5678").as_deref(), Some("+35312345678"));
    }

    #[test]
    fn international_input_ignores_default_region() {
        assert_eq!(us().normalize("+44 20 7946 0958").as_deref(), Some("+442079460958"));
        let info = us().info("+44 20 7946 0958").expect("london number");
        assert_eq!(info.region.as_deref(), Some("GB"));
        assert_eq!(info.number_type, PhoneNumberType::FixedLine);
        assert_eq!(info.national_format, "020 7946 0958");
    }

    #[test]
    fn region_agnostic_fallback_reads_digits_as_international() {
        assert_eq!(us().normalize("44 7911 123456").as_deref(), Some("+447911123456"));
    }

    #[test]
    fn unknown_calling_code_is_possible_but_not_valid() {
        let info = us().info("+254 712 345678").expect("kenyan number");
        assert_eq!(info.country_code, 254);
        assert!(info.is_possible);
        assert!(!info.is_valid);
        assert_eq!(info.number_type, PhoneNumberType::Unknown);
    }

    #[test]
    fn screening_rejects_lengths_and_characters() {
        let normalizer = us();
        assert_eq!(normalizer.validate_for_linking("12345"), Err(PhoneRejection::TooShort));
        assert_eq!(
            normalizer.validate_for_linking(&"1".repeat(MAX_INPUT_LEN + 1)),
            Err(PhoneRejection::TooLong)
        );
        assert_eq!(
            normalizer.validate_for_linking("+1 202 555 0123; DROP TABLE"),
            Err(PhoneRejection::ForbiddenCharacters)
        );
        assert_eq!(
            normalizer.validate_for_linking("<script>2025550123"),
            Err(PhoneRejection::ForbiddenCharacters)
        );
    }

    #[test]
    fn misplaced_plus_is_unparseable() {
        assert_eq!(us().validate_for_linking("202+555+0123"), Err(PhoneRejection::Unparseable));
    }

    #[test]
    fn impossible_lengths_are_rejected() {
        assert_eq!(us().normalize("+1 202 555 01"), None);
        assert_eq!(gb().normalize("07911 1234567890"), None);
    }

    #[test]
    fn normalization_is_idempotent_and_e164_shaped() {
        let inputs = [
            ("US", "202-555-0123"),
            ("US", "(415) 867.5309"),
            ("US", "1 415 867 5309"),
            ("GB", "07911 123456"),
            ("GB", "+44 (0)20 7946 0958"),
            ("US", "+33 6 12 34 56 78"),
            ("US", "+61 412 345 678"),
            ("US", "+254 712 345678"),
            ("US", "0049 151 23456789"),
        ];

        for (region, input) in inputs {
            let normalizer = PhoneNormalizer::for_region(region).expect("region");
            let once = normalizer.normalize(input).expect("normalizes");
            assert!(is_e164(&once), "`{once}` from `{input}` is not E.164");
            assert_eq!(normalizer.normalize(&once).as_deref(), Some(once.as_str()));

            let info = normalizer.info(input).expect("info");
            assert_eq!(info.e164, once, "info/normalize disagree for `{input}`");
        }
    }

    #[test]
    fn looks_like_phone_number_screens_chat_text() {
        let normalizer = gb();
        assert!(normalizer.looks_like_phone_number("07911 123456"));
        assert!(!normalizer.looks_like_phone_number("see you at training"));
        assert!(!normalizer.looks_like_phone_number("123"));
    }

    #[test]
    fn nanp_type_detection() {
        let info = us().info("(800) 555-2368").expect("toll free");
        assert_eq!(info.number_type, PhoneNumberType::TollFree);
        assert!(us().is_mobile("415-867-5309"));
    }

    #[test]
    fn unsupported_region_has_no_normalizer() {
        assert!(PhoneNormalizer::for_region("ZZ").is_none());
    }
}
