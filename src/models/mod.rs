use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Nutrition facts as returned by the analysis model.
///
/// The document is kept semi-structured: missing or extra keys are fine and
/// nothing is validated, only read through the accessors below.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NutritionRecord(Map<String, Value>);

impl NutritionRecord {
    /// Returns `None` for anything that is not a JSON object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ingredients(&self) -> Vec<&str> {
        self.0
            .get("ingredients")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn nutritional_values(&self) -> Option<&Map<String, Value>> {
        self.0.get("nutritional_values").and_then(Value::as_object)
    }

    pub fn calories(&self) -> Option<&str> {
        self.nutritional_values()?.get("calories")?.as_str()
    }

    pub fn serving_size(&self) -> Option<&str> {
        self.0.get("serving_size").and_then(Value::as_str)
    }

    /// Raw `meal_type` exactly as the model wrote it.
    pub fn meal_type(&self) -> Option<&str> {
        self.0.get("meal_type").and_then(Value::as_str)
    }

    pub fn meal_kind(&self) -> Option<MealType> {
        self.meal_type().and_then(MealType::from_string)
    }

    /// Pretty JSON with a 4-space indent, keys in document order.
    pub fn to_pretty_string(&self) -> String {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        // A map of JSON values always serializes.
        if self.0.serialize(&mut ser).is_err() {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl std::fmt::Display for MealType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MealType::Breakfast => "Breakfast",
            MealType::Lunch => "Lunch",
            MealType::Dinner => "Dinner",
            MealType::Snack => "Snack",
        };
        write!(f, "{}", s)
    }
}

impl MealType {
    pub fn from_string(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "breakfast" => Some(MealType::Breakfast),
            "lunch" => Some(MealType::Lunch),
            "dinner" | "supper" => Some(MealType::Dinner),
            "snack" => Some(MealType::Snack),
            _ => None,
        }
    }
}

/// Food photo handed to the analysis pipeline by a driver.
#[derive(Debug, Clone)]
pub enum ImageInput {
    /// Decoded pixels; must be encoded to a file before the model sees it
    Pixels(DynamicImage),
    /// Image already on disk
    Path(PathBuf),
    /// Encoded image bytes (PNG, JPEG, ...)
    Bytes(Vec<u8>),
}

/// An encoded image file the model client can read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub path: PathBuf,
    pub mime_type: String,
}

impl ImageFile {
    pub fn new(path: impl Into<PathBuf>, mime_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Guesses the MIME type from the file extension, falling back to JPEG.
    pub fn from_path(path: &Path) -> Self {
        let mime_type = ImageFormat::from_path(path)
            .map(|format| format.to_mime_type())
            .unwrap_or("image/jpeg");
        Self::new(path, mime_type)
    }
}

/// Rendered nutrition label.
#[derive(Debug, Clone)]
pub struct LabelImage {
    pub image: DynamicImage,
}

impl LabelImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn to_png_bytes(&self) -> image::ImageResult<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        self.image.write_to(&mut buf, ImageFormat::Png)?;
        Ok(buf.into_inner())
    }

    pub fn save(&self, path: &Path) -> image::ImageResult<()> {
        self.image.save(path)
    }
}

/// What the analysis pipeline hands back to its driver.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub display_text: String,
    pub record: Option<NutritionRecord>,
}

impl AnalysisOutcome {
    pub fn success(record: NutritionRecord) -> Self {
        Self {
            display_text: record.to_pretty_string(),
            record: Some(record),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            display_text: message.into(),
            record: None,
        }
    }
}
