//! Static language lookup tables
//!
//! Maps language codes to the Deepgram Aura voice used for synthesis and to
//! the human-readable name handed to the translation model. Both lookups fall
//! back to English instead of failing on an unknown code.

/// Fallback voice used when a language has no dedicated Aura model.
pub const FALLBACK_VOICE: &str = "aura-asteria-en";

/// Fallback language name handed to the translation model.
pub const FALLBACK_LANGUAGE_NAME: &str = "English";

/// Resolve a language code to a Deepgram TTS voice model.
pub fn voice_for(lang: &str) -> &'static str {
    match lang {
        "en" => "aura-asteria-en",
        "es" => "aura-2-celeste-es",
        "fr" => "aura-2-agathe-fr",
        "de" => "aura-2-lara-de",
        "pt" => FALLBACK_VOICE, // no Aura voice for pt yet
        _ => FALLBACK_VOICE,
    }
}

/// Resolve a language code to the name the translation model understands.
pub fn language_name(lang: &str) -> &'static str {
    match lang {
        "en" => "English",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "pt" => "Portuguese",
        "ja" => "Japanese",
        _ => FALLBACK_LANGUAGE_NAME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_languages_resolve_to_dedicated_voices() {
        assert_eq!(voice_for("es"), "aura-2-celeste-es");
        assert_eq!(voice_for("fr"), "aura-2-agathe-fr");
        assert_eq!(voice_for("de"), "aura-2-lara-de");
        assert_eq!(voice_for("en"), "aura-asteria-en");
    }

    #[test]
    fn unknown_language_falls_back_to_default_voice() {
        assert_eq!(voice_for("zz"), FALLBACK_VOICE);
        assert_eq!(voice_for(""), FALLBACK_VOICE);
        assert_eq!(voice_for("pt"), FALLBACK_VOICE);
    }

    #[test]
    fn language_names_for_prompting() {
        assert_eq!(language_name("fr"), "French");
        assert_eq!(language_name("ja"), "Japanese");
        assert_eq!(language_name("xx"), FALLBACK_LANGUAGE_NAME);
    }
}
