//! Name to source repository mappings for libraries and platforms

use crate::cache::naming::validate_name;
use crate::error::{TpoError, TpoResult};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

const DEFAULT_HOST: &str = "https://github.com";

/// Organization tried for library names that are not in the registry
const FALLBACK_ORG: &str = "arduino-libraries";

const BUILTIN_LIBRARIES: &[(&str, &str)] = &[
    ("fastled", "fastled/fastled"),
    ("adafruit_neopixel", "adafruit/Adafruit_NeoPixel"),
    ("arduino_json", "bblanchon/ArduinoJson"),
    ("wifi_manager", "tzapu/WiFiManager"),
    ("pubsub_client", "knolleary/pubsubclient"),
    ("esp_async_webserver", "me-no-dev/ESPAsyncWebServer"),
];

const BUILTIN_PLATFORMS: &[(&str, &str)] = &[
    ("native", "platformio/platform-native"),
    ("dev", "platformio/platform-native"),
    ("platform-native", "platformio/platform-native"),
];

/// How a name was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Listed in the registry
    Known,
    /// Not listed; the URL is a guess
    Guessed,
}

/// Immutable lookup table built once at startup
#[derive(Debug, Clone)]
pub struct Registry {
    libraries: BTreeMap<String, String>,
    platforms: BTreeMap<String, String>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Registry {
    /// The built-in mappings
    pub fn builtin() -> Self {
        let table = |entries: &[(&str, &str)]| {
            entries
                .iter()
                .map(|(name, repo)| (name.to_string(), repo_url(repo)))
                .collect()
        };
        Self {
            libraries: table(BUILTIN_LIBRARIES),
            platforms: table(BUILTIN_PLATFORMS),
        }
    }

    /// Layer user mappings over the current ones. Values are `owner/repo`
    /// or a full URL; names are matched case-insensitively.
    pub fn with_overrides(
        mut self,
        libraries: &HashMap<String, String>,
        platforms: &HashMap<String, String>,
    ) -> Self {
        for (name, repo) in libraries {
            self.libraries.insert(name.to_lowercase(), repo_url(repo));
        }
        for (name, repo) in platforms {
            self.platforms.insert(name.to_lowercase(), repo_url(repo));
        }
        self
    }

    /// Resolve a library or platform name to a repository URL.
    ///
    /// Unknown names fall back to a guess under a common publishing
    /// organization, with a warning.
    pub fn resolve(&self, name: &str) -> TpoResult<(String, Resolution)> {
        validate_name(name, "dependency")?;
        let key = name.to_lowercase();

        if let Some(url) = self.libraries.get(&key).or_else(|| self.platforms.get(&key)) {
            return Ok((url.clone(), Resolution::Known));
        }

        let guess = format!("{DEFAULT_HOST}/{FALLBACK_ORG}/{name}");
        warn!(
            "Library '{}' not in known mappings, trying fallback: {}",
            name, guess
        );
        Ok((guess, Resolution::Guessed))
    }

    /// [`Registry::resolve`] without the resolution kind
    pub fn resolve_url(&self, name: &str) -> TpoResult<String> {
        self.resolve(name).map(|(url, _)| url)
    }

    /// Resolve a platform name. Unknown platforms are an error.
    pub fn platform_url(&self, name: &str) -> TpoResult<String> {
        self.platforms
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| TpoError::UnknownDependency {
                kind: "platform".to_string(),
                name: name.to_string(),
                known: self.platforms.keys().cloned().collect(),
            })
    }

    pub fn libraries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.libraries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn platforms(&self) -> impl Iterator<Item = (&str, &str)> {
        self.platforms.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn repo_url(repo: &str) -> String {
    if repo.contains("://") {
        repo.trim_end_matches('/').to_string()
    } else {
        format!("{DEFAULT_HOST}/{}", repo.trim_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_are_case_insensitive() {
        let registry = Registry::builtin();
        assert_eq!(
            registry.resolve("FastLED").unwrap(),
            ("https://github.com/fastled/fastled".to_string(), Resolution::Known)
        );
        assert_eq!(
            registry.resolve_url("ARDUINO_JSON").unwrap(),
            "https://github.com/bblanchon/ArduinoJson"
        );
    }

    #[test]
    fn platforms_resolve_through_the_same_lookup() {
        let registry = Registry::builtin();
        assert_eq!(
            registry.resolve_url("dev").unwrap(),
            "https://github.com/platformio/platform-native"
        );
    }

    #[test]
    fn unknown_library_is_guessed() {
        let (url, how) = Registry::builtin().resolve("Servo").unwrap();
        assert_eq!(url, "https://github.com/arduino-libraries/Servo");
        assert_eq!(how, Resolution::Guessed);
    }

    #[test]
    fn unknown_platform_is_an_error() {
        let err = Registry::builtin().platform_url("esp32").unwrap_err();
        match err {
            TpoError::UnknownDependency { known, .. } => {
                assert!(known.contains(&"native".to_string()))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unsafe_names_are_rejected() {
        assert!(Registry::builtin().resolve("a|b").is_err());
        assert!(Registry::builtin().resolve("").is_err());
    }

    #[test]
    fn overrides_take_precedence() {
        let libraries = HashMap::from([
            ("FastLED".to_string(), "me/FastLED-fork".to_string()),
            ("mylib".to_string(), "https://git.example.com/team/mylib/".to_string()),
        ]);
        let registry = Registry::builtin().with_overrides(&libraries, &HashMap::new());

        assert_eq!(
            registry.resolve_url("fastled").unwrap(),
            "https://github.com/me/FastLED-fork"
        );
        assert_eq!(
            registry.resolve_url("MyLib").unwrap(),
            "https://git.example.com/team/mylib"
        );
    }
}
