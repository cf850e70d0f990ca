use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use segpack_core::{ContainerIo, RawDataset, Result, SegError, SegmentationDataset};
use serde_json::{Map, Value};

/// Keyword of the pixel data attribute.
const PIXEL_DATA: &str = "PixelData";
/// Member holding base64 bytes inside a binary attribute.
const INLINE_BINARY: &str = "InlineBinary";

/// Adapter for a JSON document keyed by attribute keyword, with the packed
/// bits stored base64 under `PixelData.InlineBinary`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonContainer {
    pretty: bool,
}

impl JsonContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

/// True when `bytes` looks like a JSON object.
pub fn is_json(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'{')
}

impl ContainerIo for JsonContainer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn read_container(&self, bytes: &[u8]) -> Result<RawDataset> {
        let mut attributes = match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(SegError::Format("JSON container is not an object".into())),
            Err(e) => return Err(SegError::Format(format!("JSON container does not parse: {e}"))),
        };

        let encoded = match attributes.remove(PIXEL_DATA) {
            Some(Value::Object(mut binary)) => match binary.remove(INLINE_BINARY) {
                Some(Value::String(encoded)) => encoded,
                _ => {
                    return Err(SegError::Format(format!(
                        "{PIXEL_DATA} has no {INLINE_BINARY} string"
                    )))
                }
            },
            Some(_) => return Err(SegError::Format(format!("{PIXEL_DATA} must be an object"))),
            None => return Err(SegError::Format(format!("JSON container has no {PIXEL_DATA}"))),
        };
        let pixel_data = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| SegError::Format(format!("{PIXEL_DATA} is not valid base64: {e}")))?;

        Ok(RawDataset {
            attributes,
            pixel_data,
        })
    }

    fn serialize_dataset(&self, dataset: &SegmentationDataset) -> Result<Vec<u8>> {
        let raw = dataset.to_raw()?;
        let mut attributes = raw.attributes;
        let mut binary = Map::new();
        binary.insert(
            INLINE_BINARY.into(),
            Value::String(STANDARD.encode(&raw.pixel_data)),
        );
        attributes.insert(PIXEL_DATA.into(), Value::Object(binary));
        let document = Value::Object(attributes);
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&document)?
        } else {
            serde_json::to_vec(&document)?
        };
        Ok(bytes)
    }
}
