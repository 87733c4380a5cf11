//! Minimal BSON encoder for building test streams.

/// One field of a test document
pub enum Field<'a> {
    Int(&'a str, i32),
    Long(&'a str, i64),
    Text(&'a str, &'a str),
    Date(&'a str, i64),
    Doc(&'a str, Vec<Field<'a>>),
}

pub fn document(fields: &[Field<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for field in fields {
        match field {
            Field::Int(key, v) => element(&mut body, 0x10, key, &v.to_le_bytes()),
            Field::Long(key, v) => element(&mut body, 0x12, key, &v.to_le_bytes()),
            Field::Date(key, v) => element(&mut body, 0x09, key, &v.to_le_bytes()),
            Field::Text(key, s) => {
                let mut payload = ((s.len() + 1) as i32).to_le_bytes().to_vec();
                payload.extend_from_slice(s.as_bytes());
                payload.push(0);
                element(&mut body, 0x02, key, &payload);
            }
            Field::Doc(key, inner) => element(&mut body, 0x03, key, &document(inner)),
        }
    }
    envelope(body)
}

fn element(body: &mut Vec<u8>, tag: u8, key: &str, payload: &[u8]) {
    body.push(tag);
    body.extend_from_slice(key.as_bytes());
    body.push(0);
    body.extend_from_slice(payload);
}

fn envelope(mut body: Vec<u8>) -> Vec<u8> {
    body.push(0);
    let mut doc = ((body.len() + 4) as i32).to_le_bytes().to_vec();
    doc.extend_from_slice(&body);
    doc
}

/// A framable document whose body holds an unknown element type
pub fn undecodable() -> Vec<u8> {
    let mut body = Vec::new();
    element(&mut body, 0x42, "bad", &[1, 2, 3]);
    envelope(body)
}

/// `depth` containers of element type `tag`, each the only field "0" of
/// its parent, around an empty document
pub fn nested(depth: usize, tag: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(5 + 9 * depth);
    for level in (1..=depth).rev() {
        out.extend_from_slice(&((5 + 8 * level) as i32).to_le_bytes());
        out.extend_from_slice(&[tag, b'0', 0]);
    }
    out.extend_from_slice(&[5, 0, 0, 0, 0]);
    out.resize(out.len() + depth, 0);
    out
}

pub fn concat(documents: &[Vec<u8>]) -> Vec<u8> {
    documents.concat()
}
