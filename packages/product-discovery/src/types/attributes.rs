//! Closed coffee vocabularies.
//!
//! Each vocabulary has two parsers:
//! - `parse` is strict: a case-insensitive match against the member names or a
//!   fixed synonym table, used to validate language-model output.
//! - `from_text` is lenient: it scans free text for tell-tale words, used by the
//!   structured extractor on descriptions and attribute tables.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowercase, trim and fold spaces/underscores into hyphens.
fn canonical(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
        synonyms { $($syn:literal => $target:ident),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(rename_all = "kebab-case")]
        pub enum $name {
            $($variant,)+
            #[default]
            Unknown,
        }

        impl $name {
            /// Every member, `Unknown` last.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+ $name::Unknown];

            /// Wire name of the member.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                    $name::Unknown => "unknown",
                }
            }

            /// Strict, case-insensitive parse. Unrecognized input is `None`.
            pub fn parse(raw: &str) -> Option<Self> {
                let key = canonical(raw);
                match key.as_str() {
                    $($text => Some($name::$variant),)+
                    "unknown" => Some($name::Unknown),
                    $($syn => Some($name::$target),)*
                    _ => None,
                }
            }

            pub fn is_unknown(self) -> bool {
                self == $name::Unknown
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary! {
    /// Roast level of a coffee.
    RoastLevel {
        Light => "light",
        LightMedium => "light-medium",
        Medium => "medium",
        MediumDark => "medium-dark",
        Dark => "dark",
        City => "city",
        CityPlus => "city-plus",
        FullCity => "full-city",
        French => "french",
        Italian => "italian",
        Cinnamon => "cinnamon",
        Filter => "filter",
        Espresso => "espresso",
        Omniroast => "omniroast",
    }
    synonyms {
        "medium-light" => LightMedium,
        "city+" => CityPlus,
        "omni" => Omniroast,
        "omni-roast" => Omniroast,
        "light-roast" => Light,
        "medium-roast" => Medium,
        "dark-roast" => Dark,
        "medium-dark-roast" => MediumDark,
    }
}

vocabulary! {
    /// Species or blend composition of the beans.
    BeanType {
        Arabica => "arabica",
        Robusta => "robusta",
        Liberica => "liberica",
        Blend => "blend",
        MixedArabica => "mixed-arabica",
        ArabicaRobusta => "arabica-robusta",
    }
    synonyms {
        "arabica-&-robusta" => ArabicaRobusta,
        "arabica-and-robusta" => ArabicaRobusta,
        "arabica/robusta" => ArabicaRobusta,
        "robusta-arabica" => ArabicaRobusta,
        "100%-arabica" => Arabica,
    }
}

vocabulary! {
    /// Post-harvest processing method.
    ProcessingMethod {
        Washed => "washed",
        Natural => "natural",
        Honey => "honey",
        PulpedNatural => "pulped-natural",
        Anaerobic => "anaerobic",
        Monsooned => "monsooned",
        WetHulled => "wet-hulled",
        CarbonicMaceration => "carbonic-maceration",
        DoubleFermented => "double-fermented",
    }
    synonyms {
        "wet-process" => Washed,
        "wet-processed" => Washed,
        "fully-washed" => Washed,
        "dry-process" => Natural,
        "dry-processed" => Natural,
        "sun-dried" => Natural,
        "monsoon" => Monsooned,
        "monsoon-malabar" => Monsooned,
        "monsooned-malabar" => Monsooned,
        "semi-washed" => WetHulled,
        "giling-basah" => WetHulled,
    }
}

impl RoastLevel {
    /// Lenient scan of free text, e.g. "a medium dark roast with..." → `MediumDark`.
    pub fn from_text(text: &str) -> Self {
        let text = text.to_lowercase();
        if let Some(level) = Self::parse(&text) {
            return level;
        }
        let medium = text.contains("medium");
        if medium && text.contains("light") {
            RoastLevel::LightMedium
        } else if medium && text.contains("dark") {
            RoastLevel::MediumDark
        } else if medium {
            RoastLevel::Medium
        } else if text.contains("full city") || text.contains("full-city") {
            RoastLevel::FullCity
        } else if text.contains("omni") {
            RoastLevel::Omniroast
        } else if text.contains("light") {
            RoastLevel::Light
        } else if text.contains("dark") {
            RoastLevel::Dark
        } else {
            RoastLevel::Unknown
        }
    }

    /// Only phrases that explicitly name a roast ("medium roast"), for prose.
    pub fn from_description(text: &str) -> Self {
        let text = text.to_lowercase();
        const PHRASES: &[(&str, RoastLevel)] = &[
            ("medium-light roast", RoastLevel::LightMedium),
            ("medium light roast", RoastLevel::LightMedium),
            ("light-medium roast", RoastLevel::LightMedium),
            ("light medium roast", RoastLevel::LightMedium),
            ("medium-dark roast", RoastLevel::MediumDark),
            ("medium dark roast", RoastLevel::MediumDark),
            ("light roast", RoastLevel::Light),
            ("medium roast", RoastLevel::Medium),
            ("dark roast", RoastLevel::Dark),
            ("omni roast", RoastLevel::Omniroast),
            ("omniroast", RoastLevel::Omniroast),
        ];
        PHRASES
            .iter()
            .find(|(phrase, _)| text.contains(phrase))
            .map(|(_, level)| *level)
            .unwrap_or(RoastLevel::Unknown)
    }
}

impl BeanType {
    /// Lenient scan of free text.
    pub fn from_text(text: &str) -> Self {
        let text = text.to_lowercase();
        let arabica = text.contains("arabica");
        let robusta = text.contains("robusta");
        if arabica && robusta {
            BeanType::ArabicaRobusta
        } else if text.contains("liberica") {
            BeanType::Liberica
        } else if arabica {
            BeanType::Arabica
        } else if robusta {
            BeanType::Robusta
        } else if text.contains("blend") {
            BeanType::Blend
        } else {
            BeanType::Unknown
        }
    }
}

impl ProcessingMethod {
    /// Lenient scan of free text. More specific methods are checked first so
    /// "pulped natural" does not read as plain "natural".
    pub fn from_text(text: &str) -> Self {
        let text = text.to_lowercase();
        const MARKERS: &[(&str, ProcessingMethod)] = &[
            ("carbonic maceration", ProcessingMethod::CarbonicMaceration),
            ("double fermented", ProcessingMethod::DoubleFermented),
            ("double-fermented", ProcessingMethod::DoubleFermented),
            ("pulped natural", ProcessingMethod::PulpedNatural),
            ("pulped-natural", ProcessingMethod::PulpedNatural),
            ("anaerobic", ProcessingMethod::Anaerobic),
            ("monsoon", ProcessingMethod::Monsooned),
            ("wet hulled", ProcessingMethod::WetHulled),
            ("wet-hulled", ProcessingMethod::WetHulled),
            ("honey", ProcessingMethod::Honey),
            ("washed", ProcessingMethod::Washed),
            ("wet process", ProcessingMethod::Washed),
            ("natural", ProcessingMethod::Natural),
            ("dry process", ProcessingMethod::Natural),
            ("sun dried", ProcessingMethod::Natural),
        ];
        MARKERS
            .iter()
            .find(|(marker, _)| text.contains(marker))
            .map(|(_, method)| *method)
            .unwrap_or(ProcessingMethod::Unknown)
    }
}
