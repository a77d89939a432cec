use anyhow::{Context, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use log::warn;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use unic_langid::LanguageIdentifier;

use crate::config::{DEFAULT_LANGUAGE, DEFAULT_LOCALES_DIR};

/// Languages shipped with the crate
pub const SUPPORTED_LANGUAGES: [&str; 2] = ["en", "es"];

/// Localization manager for user-facing pantry text
pub struct LocalizationManager {
    bundles: HashMap<String, Arc<FluentBundle<FluentResource>>>,
}

impl LocalizationManager {
    /// Create a localization manager reading `./locales`
    pub fn new() -> Result<Self> {
        Self::from_dir(DEFAULT_LOCALES_DIR)
    }

    /// Create a localization manager reading `<dir>/<lang>/main.ftl`
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let mut bundles = HashMap::new();

        for language in SUPPORTED_LANGUAGES {
            let locale: LanguageIdentifier = language
                .parse()
                .with_context(|| format!("Invalid language identifier: {language}"))?;
            let bundle = Self::create_bundle(dir.as_ref(), &locale)?;
            bundles.insert(language.to_string(), Arc::new(bundle));
        }

        Ok(Self { bundles })
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(dir: &Path, locale: &LanguageIdentifier) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // Plain text output for chat and clipboard sharing
        bundle.set_use_isolating(false);

        let resource_path = dir.join(locale.to_string()).join("main.ftl");
        match fs::read_to_string(&resource_path) {
            Ok(content) => match FluentResource::try_new(content) {
                Ok(resource) => {
                    if let Err(errors) = bundle.add_resource(resource) {
                        warn!("Duplicate messages in {}: {:?}", resource_path.display(), errors);
                    }
                }
                Err((_, errors)) => {
                    warn!("Failed to parse {}: {:?}", resource_path.display(), errors);
                }
            },
            Err(e) => warn!("Missing locale resource {}: {}", resource_path.display(), e),
        }

        Ok(bundle)
    }

    /// Whether a bundle exists for this language
    pub fn supports(&self, language: &str) -> bool {
        self.bundles.contains_key(language)
    }

    /// Get a localized message in English
    pub fn get_message(&self, key: &str, args: Option<&HashMap<&str, &str>>) -> String {
        self.get_message_in_language(key, DEFAULT_LANGUAGE, args)
    }

    /// Get a localized message, falling back to English for unknown languages
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let bundle = match self
            .bundles
            .get(language)
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE))
        {
            Some(bundle) => bundle,
            None => return format!("Missing translation: {}", key),
        };

        let msg = match bundle.get_message(key) {
            Some(msg) => msg,
            None => return format!("Missing translation: {}", key),
        };

        let pattern = match msg.value() {
            Some(pattern) => pattern,
            None => return format!("Missing value for key: {}", key),
        };

        let fluent_args = args.map(|args| {
            FluentArgs::from_iter(args.iter().map(|(k, v)| (*k, FluentValue::from(*v))))
        });

        let mut errors = vec![];
        bundle
            .format_pattern(pattern, fluent_args.as_ref(), &mut errors)
            .into_owned()
    }

    /// Get a localized message with simple string arguments
    pub fn get_message_with_args(&self, key: &str, language: &str, args: &[(&str, &str)]) -> String {
        let args_map: HashMap<&str, &str> = args.iter().cloned().collect();
        self.get_message_in_language(key, language, Some(&args_map))
    }
}

/// Global localization instance
static LOCALIZATION_MANAGER: OnceLock<LocalizationManager> = OnceLock::new();

/// Initialize the global localization manager from a locales directory
///
/// Later calls keep the first manager.
pub fn init_localization<P: AsRef<Path>>(dir: P) -> Result<()> {
    let manager = LocalizationManager::from_dir(dir)?;
    let _ = LOCALIZATION_MANAGER.set(manager);
    Ok(())
}

/// Get the global localization manager, loading `./locales` on first use
pub fn get_localization_manager() -> &'static LocalizationManager {
    LOCALIZATION_MANAGER.get_or_init(|| {
        LocalizationManager::new().unwrap_or_else(|e| {
            warn!("Falling back to empty localization bundles: {e}");
            LocalizationManager {
                bundles: HashMap::new(),
            }
        })
    })
}

/// Convenience function to get a localized message
pub fn t(key: &str, language: &str) -> String {
    get_localization_manager().get_message_in_language(key, language, None)
}

/// Convenience function to get a localized message with arguments
pub fn t_args(key: &str, language: &str, args: &[(&str, &str)]) -> String {
    get_localization_manager().get_message_with_args(key, language, args)
}
