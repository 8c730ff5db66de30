#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountryCode {
    Usa,
    Germany,
    Spain,
    France,
    Italy,
    Portugal,
    Russia,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    EnglishUsa,
    German,
    Spanish,
    French,
    Italian,
    Portuguese,
    Russian,
}

/// Country/language pair the device manager is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerLocale {
    pub country: CountryCode,
    pub language: Language,
}

impl Default for ManagerLocale {
    fn default() -> Self {
        Self {
            country: CountryCode::Usa,
            language: Language::EnglishUsa,
        }
    }
}

/// Map a language tag ("de", "de-AT", "fr_CA.UTF-8") to the manager
/// locale of its parent language.
pub fn country_and_language(tag: &str) -> ManagerLocale {
    let parent = tag
        .split(['-', '_', '.'])
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();

    let (country, language) = match parent.as_str() {
        "de" => (CountryCode::Germany, Language::German),
        "es" => (CountryCode::Spain, Language::Spanish),
        "fr" => (CountryCode::France, Language::French),
        "it" => (CountryCode::Italy, Language::Italian),
        "pt" => (CountryCode::Portugal, Language::Portuguese),
        "ru" => (CountryCode::Russia, Language::Russian),
        _ => return ManagerLocale::default(),
    };

    ManagerLocale { country, language }
}

pub fn locale_tag_from_env() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|v| !v.is_empty() && v != "C" && v != "POSIX")
        .unwrap_or_else(|| "en".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn german_maps_to_germany() {
        assert_eq!(
            country_and_language("de"),
            ManagerLocale {
                country: CountryCode::Germany,
                language: Language::German
            }
        );
    }

    #[test]
    fn unmapped_language_defaults_to_us_english() {
        assert_eq!(country_and_language("xx"), ManagerLocale::default());
        assert_eq!(country_and_language(""), ManagerLocale::default());
    }

    #[test]
    fn region_and_encoding_are_ignored() {
        assert_eq!(country_and_language("fr_CA.UTF-8").country, CountryCode::France);
        assert_eq!(country_and_language("pt-BR").language, Language::Portuguese);
        assert_eq!(country_and_language("RU").country, CountryCode::Russia);
    }
}
