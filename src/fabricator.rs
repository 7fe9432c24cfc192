//! Synthetic message fabrication.
//!
//! Produces envelopes for benchmarking: deterministic metadata, a realistic
//! header preamble plus configurable bloat fields, and a fixed-size filler
//! body. Pure construction, no failure modes.

use serde::Deserialize;

use crate::{body::Body, header::Header, message::MsgMetadata};

/// Default body size, approximating an average real-world message.
pub const DEFAULT_BODY_SIZE: usize = 100 * 1024;
/// Default count of synthetic oversized header fields.
pub const DEFAULT_EXTRA_HEADER_FIELDS: usize = 20;
/// Default size of each synthetic header field value.
pub const DEFAULT_EXTRA_HEADER_FIELD_SIZE: usize = 100;

/// The fixed preamble of realistic header fields.
///
/// An explicitly constructed, immutable value passed into the fabricator; the
/// default carries the nine fields a typical delivered message starts with.
#[derive(Debug, Clone)]
pub struct HeaderPreamble {
    fields: Header,
}

impl HeaderPreamble {
    /// Use a custom preamble.
    #[must_use]
    pub const fn new(fields: Header) -> Self {
        Self { fields }
    }

    /// The preamble fields in order.
    #[must_use]
    pub const fn fields(&self) -> &Header {
        &self.fields
    }
}

impl Default for HeaderPreamble {
    fn default() -> Self {
        let mut fields = Header::new();
        fields.add("From", r#""whatever whatever" <whatever@example.org>"#);
        fields.add(
            "To",
            r#""whatever whatever" <whatever@example.org>, "fool" <fool@example.org>"#,
        );
        fields.add("Date", "Tue, 08 Oct 2019 06:25:41 +0000");
        fields.add("Subject", "Heya Heya Heya Heya");
        fields.add("Content-Type", "text/plain; charset=us-ascii");
        fields.add("MIME-Version", "1.0");
        fields.add("Content-Transfer-Encoding", "8bit");
        fields.add("Message-ID", "<AAAAAAAAAAAAAAAAAA@example.org>");
        fields.add(
            "Received",
            "from whatever ([127.0.0.1]) by whatever ([127.0.0.1]) \
             with whatever id whatever for whatever@example.org",
        );
        Self { fields }
    }
}

/// Fabrication parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct FabricatorConfig {
    /// Body size in bytes.
    #[serde(default = "default_body_size")]
    pub body_size: usize,
    /// How many synthetic bloat fields to append after the preamble.
    #[serde(default = "default_extra_header_fields")]
    pub extra_header_fields: usize,
    /// Value size of each synthetic bloat field.
    #[serde(default = "default_extra_header_field_size")]
    pub extra_header_field_size: usize,
}

const fn default_body_size() -> usize {
    DEFAULT_BODY_SIZE
}

const fn default_extra_header_fields() -> usize {
    DEFAULT_EXTRA_HEADER_FIELDS
}

const fn default_extra_header_field_size() -> usize {
    DEFAULT_EXTRA_HEADER_FIELD_SIZE
}

impl Default for FabricatorConfig {
    fn default() -> Self {
        Self {
            body_size: DEFAULT_BODY_SIZE,
            extra_header_fields: DEFAULT_EXTRA_HEADER_FIELDS,
            extra_header_field_size: DEFAULT_EXTRA_HEADER_FIELD_SIZE,
        }
    }
}

/// Builds synthetic envelopes for benchmark runs.
#[derive(Debug, Clone, Default)]
pub struct Fabricator {
    preamble: HeaderPreamble,
    config: FabricatorConfig,
}

impl Fabricator {
    /// Create a fabricator with an explicit preamble and configuration.
    #[must_use]
    pub const fn new(preamble: HeaderPreamble, config: FabricatorConfig) -> Self {
        Self { preamble, config }
    }

    /// Fabricate one envelope.
    ///
    /// The metadata ID is derived deterministically from `name`, so repeated
    /// calls with the same name are reproducible. Sender tracing is always
    /// suppressed for synthetic traffic.
    #[must_use]
    pub fn build(&self, name: &str) -> (MsgMetadata, Header, Body) {
        let metadata = MsgMetadata::synthetic(name);

        let mut header = self.preamble.fields.clone();
        for i in 0..self.config.extra_header_fields {
            header.add(
                format!("AAAAAAAAAAAA-{i}"),
                "A".repeat(self.config.extra_header_field_size),
            );
        }

        (metadata, header, Body::filler(self.config.body_size))
    }
}
