//! Capability registry and dispatcher.
//!
//! Converters are registered once at startup with an explicit priority.
//! Selection for an (extension, format) pair scans by priority, highest
//! first, and falls back to registration order among equal priorities.
//! The capability map is computed when the registry is built and never
//! changes afterwards, so a `Registry` can be shared behind an `Arc` and
//! read from concurrent requests without locking.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::convert::{
    ConversionOptions, ConversionOutput, ConversionRequest, ConverterFactory, ConverterTrait,
};
use crate::error::{FluxifyError, Result};
use crate::fallback::non_empty_file;
use crate::tool::CommandRunner;

/// Input extension -> every output format reachable from it
pub type CapabilityMap = BTreeMap<String, BTreeSet<String>>;

struct Registration {
    converter: Box<dyn ConverterTrait>,
    priority: i32,
}

#[derive(Default)]
pub struct RegistryBuilder {
    registrations: Vec<Registration>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register with the default priority of 0
    pub fn register(self, converter: Box<dyn ConverterTrait>) -> Self {
        self.register_with_priority(converter, 0)
    }

    pub fn register_with_priority(mut self, converter: Box<dyn ConverterTrait>, priority: i32) -> Self {
        debug!(
            "Registering converter {} (priority {}, position {})",
            converter.name(),
            priority,
            self.registrations.len()
        );
        self.registrations.push(Registration { converter, priority });
        self
    }

    pub fn build(mut self) -> Registry {
        // Stable sort keeps registration order among equal priorities
        self.registrations.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut capabilities = CapabilityMap::new();
        for registration in &self.registrations {
            let converter = &registration.converter;
            for ext in converter.input_extensions() {
                capabilities
                    .entry(ext.to_string())
                    .or_default()
                    .extend(converter.output_formats().iter().map(|f| f.to_string()));
            }
        }

        Registry {
            converters: self.registrations,
            capabilities,
        }
    }
}

/// Immutable set of converters plus their aggregate capability map
pub struct Registry {
    converters: Vec<Registration>,
    capabilities: CapabilityMap,
}

impl Registry {
    /// All built-in converters in default order, with priorities from config
    pub fn from_config(config: &Config, runner: Arc<dyn CommandRunner>) -> Self {
        let mut builder = RegistryBuilder::new();
        for converter in ConverterFactory::create_all(config, runner) {
            let priority = config
                .registry
                .priorities
                .get(converter.name())
                .copied()
                .unwrap_or(0);
            builder = builder.register_with_priority(converter, priority);
        }
        builder.build()
    }

    pub fn supported_formats(&self) -> &CapabilityMap {
        &self.capabilities
    }

    /// Converter names in selection order
    pub fn converter_names(&self) -> Vec<&'static str> {
        self.converters.iter().map(|r| r.converter.name()).collect()
    }

    /// The converter that would handle `ext -> format`, if any
    pub fn select(&self, ext: &str, format: &str) -> Option<&dyn ConverterTrait> {
        self.converters
            .iter()
            .map(|r| r.converter.as_ref())
            .find(|c| c.supports(ext, format))
    }

    pub async fn dispatch(&self, request: &ConversionRequest) -> Result<ConversionOutput> {
        let ext = request.input_extension();
        let format = request.output_format.as_str();

        let converter = self.select(&ext, format).ok_or_else(|| FluxifyError::NoRouteFound {
            ext: ext.clone(),
            format: format.to_string(),
        })?;
        info!(
            "Converting {} -> {} with {}",
            request.input_path.display(),
            format,
            converter.name()
        );

        let output = converter.convert(request).await?;
        for path in output.paths() {
            if !non_empty_file(path) {
                return Err(FluxifyError::EmptyOutputFailure {
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(output)
    }

    /// Convenience wrapper building the request from its parts
    pub async fn convert<P: Into<PathBuf>>(
        &self,
        input_path: P,
        output_format: &str,
        options: ConversionOptions,
    ) -> Result<ConversionOutput> {
        let request = ConversionRequest::new(input_path, output_format).with_options(options);
        self.dispatch(&request).await
    }
}
