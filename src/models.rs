use image::{GrayImage, Luma};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Classes the detector is trained on. Index order matches the model's class ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementClass {
    #[serde(rename = "BG")]
    Background,
    Wall,
    Window,
    Door,
}

impl ElementClass {
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(ElementClass::Background),
            1 => Some(ElementClass::Wall),
            2 => Some(ElementClass::Window),
            3 => Some(ElementClass::Door),
            _ => None,
        }
    }

    pub fn id(&self) -> u32 {
        match self {
            ElementClass::Background => 0,
            ElementClass::Wall => 1,
            ElementClass::Window => 2,
            ElementClass::Door => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ElementClass::Background => "BG",
            ElementClass::Wall => "Wall",
            ElementClass::Window => "Window",
            ElementClass::Door => "Door",
        }
    }
}

/// Axis-aligned box in normalized-image coordinates, as the detector reports it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// `0 <= x1 < x2 <= width` and likewise for y.
    pub fn is_within(&self, width: u32, height: u32) -> bool {
        self.x1 >= 0.0
            && self.y1 >= 0.0
            && self.x1 < self.x2
            && self.y1 < self.y2
            && self.x2 <= width as f32
            && self.y2 <= height as f32
    }

    /// Integer corners, truncated toward zero.
    pub fn truncated(&self) -> [i32; 4] {
        [
            self.x1 as i32,
            self.y1 as i32,
            self.x2 as i32,
            self.y2 as i32,
        ]
    }
}

/// Per-instance boolean raster, same size as the image it was detected on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl InstanceMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> Self {
        let mut mask = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                if f(x, y) {
                    mask.set(x, y, true);
                }
            }
        }
        mask
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.bits[i] = value;
        }
    }

    /// Set the half-open rectangle `[x1, x2) x [y1, y2)`, clipped to the mask.
    pub fn fill_rect(&mut self, x1: u32, y1: u32, x2: u32, y2: u32, value: bool) {
        let x2 = x2.min(self.width);
        let y2 = y2.min(self.height);
        for y in y1..y2 {
            for x in x1..x2 {
                let i = self.index(x, y);
                self.bits[i] = value;
            }
        }
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    /// 0/255 raster for contour tracing.
    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            if self.get(x, y) { Luma([255u8]) } else { Luma([0u8]) }
        })
    }
}

/// One instance found by a detector.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class: ElementClass,
    pub score: f32,
    pub bbox: BoundingBox,
    pub mask: InstanceMask,
}

/// Persisted polygon + box representation of a detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometricElement {
    #[serde(rename = "type")]
    pub element_type: ElementClass,
    pub confidence: f64,
    pub bbox: [i32; 4],
    pub contour: Vec<[i32; 2]>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementGroups {
    pub walls: Vec<GeometricElement>,
    pub windows: Vec<GeometricElement>,
    pub doors: Vec<GeometricElement>,
}

impl ElementGroups {
    pub fn len(&self) -> usize {
        self.walls.len() + self.windows.len() + self.doors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All elements, walls first, then windows, then doors.
    pub fn iter(&self) -> impl Iterator<Item = &GeometricElement> {
        self.walls
            .iter()
            .chain(self.windows.iter())
            .chain(self.doors.iter())
    }
}

/// The unit of persistence. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub id: Uuid,
    #[serde(
        default,
        serialize_with = "serialize_timestamp",
        deserialize_with = "deserialize_timestamp"
    )]
    pub timestamp: Option<OffsetDateTime>,
    pub filename: String,
    pub elements: ElementGroups,
    pub image_url: String,
}

fn serialize_timestamp<S: Serializer>(
    value: &Option<OffsetDateTime>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(ts) => {
            let formatted = ts.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
            serializer.serialize_some(&formatted)
        }
        None => serializer.serialize_none(),
    }
}

/// Unparsable timestamps load as `None` instead of failing the whole record.
fn deserialize_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<OffsetDateTime>, D::Error> {
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(|v| v.as_str())
        .and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok()))
}
