//! Hand-assembled BSON encodings for unit tests.

/// Builds one document's bytes element by element
#[derive(Debug, Clone, Default)]
pub(crate) struct DocBuilder {
    body: Vec<u8>,
}

impl DocBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends an element with an arbitrary tag and payload
    pub(crate) fn element(mut self, tag: u8, key: &str, payload: &[u8]) -> Self {
        self.body.push(tag);
        self.body.extend_from_slice(key.as_bytes());
        self.body.push(0);
        self.body.extend_from_slice(payload);
        self
    }

    pub(crate) fn double(self, key: &str, value: f64) -> Self {
        self.element(0x01, key, &value.to_le_bytes())
    }

    pub(crate) fn string(self, key: &str, value: &str) -> Self {
        self.element(0x02, key, &string_payload(value))
    }

    pub(crate) fn document(self, key: &str, doc: DocBuilder) -> Self {
        self.element(0x03, key, &doc.build())
    }

    /// Array whose elements are the fields of `items` (keys should be "0", "1", ...)
    pub(crate) fn array(self, key: &str, items: DocBuilder) -> Self {
        self.element(0x04, key, &items.build())
    }

    pub(crate) fn binary(self, key: &str, subtype: u8, bytes: &[u8]) -> Self {
        let mut payload = (bytes.len() as i32).to_le_bytes().to_vec();
        payload.push(subtype);
        payload.extend_from_slice(bytes);
        self.element(0x05, key, &payload)
    }

    pub(crate) fn object_id(self, key: &str, id: [u8; 12]) -> Self {
        self.element(0x07, key, &id)
    }

    pub(crate) fn boolean(self, key: &str, value: bool) -> Self {
        self.element(0x08, key, &[u8::from(value)])
    }

    pub(crate) fn datetime(self, key: &str, millis: i64) -> Self {
        self.element(0x09, key, &millis.to_le_bytes())
    }

    pub(crate) fn null(self, key: &str) -> Self {
        self.element(0x0A, key, &[])
    }

    pub(crate) fn int32(self, key: &str, value: i32) -> Self {
        self.element(0x10, key, &value.to_le_bytes())
    }

    pub(crate) fn int64(self, key: &str, value: i64) -> Self {
        self.element(0x12, key, &value.to_le_bytes())
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let total = (self.body.len() + 5) as i32;
        let mut out = total.to_le_bytes().to_vec();
        out.extend_from_slice(&self.body);
        out.push(0);
        out
    }
}

fn string_payload(value: &str) -> Vec<u8> {
    let mut payload = ((value.len() + 1) as i32).to_le_bytes().to_vec();
    payload.extend_from_slice(value.as_bytes());
    payload.push(0);
    payload
}

/// Concatenates documents into one stream
pub(crate) fn stream(documents: &[Vec<u8>]) -> Vec<u8> {
    documents.concat()
}

/// A document whose only element carries an unknown type tag
pub(crate) fn unknown_type_document() -> Vec<u8> {
    DocBuilder::new().element(0x42, "bad", &[]).build()
}

/// A document nesting `depth` containers of type `tag` under key "0",
/// innermost empty. Written front to back so building stays linear.
pub(crate) fn nested(depth: usize, tag: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(5 + 9 * depth);
    for level in (1..=depth).rev() {
        out.extend_from_slice(&((5 + 8 * level) as i32).to_le_bytes());
        out.extend_from_slice(&[tag, b'0', 0]);
    }
    out.extend_from_slice(&[5, 0, 0, 0, 0]);
    out.resize(out.len() + depth, 0);
    out
}
