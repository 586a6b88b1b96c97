/// Configuration module for the pipeline public API.
///
/// This module provides configuration structs and a builder covering every
/// stage of the pipeline: parsing, attribute extension, rendering, and
/// update throttling.
use std::time::Duration;

use crate::attrs::AttrsConfig;
use crate::parser::ParserConfig;
use crate::render::RenderConfig;

/// Timing configuration for update coalescing.
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Window for full parse plus render updates.
    pub parse_window: Duration,
    /// Window for render-only updates (presentation flag changes).
    pub render_window: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            parse_window: Duration::from_millis(100),
            render_window: Duration::from_millis(50),
        }
    }
}

/// Main configuration struct for the markdown pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Parser configuration
    pub parser: ParserConfig,
    /// Attribute-extension configuration
    pub attrs: AttrsConfig,
    /// Render configuration
    pub render: RenderConfig,
    /// Throttle configuration
    pub throttle: ThrottleConfig,
    /// Strip raw HTML from the input before parsing
    pub remove_html_before_conversion: bool,
    /// Emit verbose tracing of parse and render cycles
    pub debug: bool,
}

impl PipelineConfig {
    /// Creates a builder for configuring the pipeline.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }
}

/// Builder for PipelineConfig to provide a fluent configuration API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Creates a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the parser configuration.
    pub fn parser(mut self, parser_config: ParserConfig) -> Self {
        self.config.parser = parser_config;
        self
    }

    /// Sets the attribute-extension configuration.
    pub fn attrs(mut self, attrs_config: AttrsConfig) -> Self {
        self.config.attrs = attrs_config;
        self
    }

    /// Sets the render configuration.
    pub fn render(mut self, render_config: RenderConfig) -> Self {
        self.config.render = render_config;
        self
    }

    /// Sets the throttle configuration.
    pub fn throttle(mut self, throttle_config: ThrottleConfig) -> Self {
        self.config.throttle = throttle_config;
        self
    }

    /// Enables or disables sanitization of raw HTML in the output.
    pub fn sanitize_html(mut self, enabled: bool) -> Self {
        self.config.render.sanitize = enabled;
        self
    }

    /// Enables or disables streaming mode.
    pub fn streaming(mut self, enabled: bool) -> Self {
        self.config.render.streaming = enabled;
        self
    }

    /// Strips raw HTML from the input before parsing.
    pub fn remove_html_before_conversion(mut self, enabled: bool) -> Self {
        self.config.remove_html_before_conversion = enabled;
        self
    }

    /// Enables or disables preservation of raw HTML tags during parsing.
    pub fn preserve_html(mut self, enabled: bool) -> Self {
        self.config.parser.preserve_html = enabled;
        self
    }

    /// Sets maximum nesting depth for inline parsing.
    pub fn max_nesting_depth(mut self, depth: usize) -> Self {
        self.config.parser.max_nesting_depth = depth;
        self
    }

    /// Sets the throttle window for full parse updates.
    pub fn parse_window(mut self, window: Duration) -> Self {
        self.config.throttle.parse_window = window;
        self
    }

    /// Sets the throttle window for render-only updates.
    pub fn render_window(mut self, window: Duration) -> Self {
        self.config.throttle.render_window = window;
        self
    }

    /// Enables verbose tracing.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    /// Builds the final configuration.
    pub fn build(self) -> PipelineConfig {
        self.config
    }
}
