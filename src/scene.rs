//! Scene snapshot and embedded entity types.
//!
//! DESIGN
//! ======
//! The scene is read once as an immutable snapshot. Field names follow the
//! host document schema (`_id`, `offsetX`, `c`, `shape.width`, ...) so the
//! same types deserialize straight from a stored scene document. Missing
//! geometry deserializes as zero.

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// SCENE
// =============================================================================

/// Immutable view of the scene-level settings the rotation reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub background: BackgroundImage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreground: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub grid: GridConfig,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fog: FogConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub offset_x: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub offset_y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: GridType,
    #[serde(default = "default_grid_size", deserialize_with = "null_as_grid_size")]
    pub size: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { kind: GridType::default(), size: default_grid_size() }
    }
}

fn default_grid_size() -> f64 {
    100.0
}

/// Hosts store cleared fields as `null`; read them like absent ones.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_grid_size<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_else(default_grid_size))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FogConfig {
    #[serde(default, deserialize_with = "null_as_default")]
    pub exploration: bool,
}

// =============================================================================
// GRID TYPE
// =============================================================================

/// Host grid type, stored as an integer. Integers this engine does not know
/// are kept as `Other` and written back unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum GridType {
    Gridless,
    #[default]
    Square,
    HexRowsOdd,
    HexRowsEven,
    HexColsOdd,
    HexColsEven,
    Other(u8),
}

impl GridType {
    /// Remap row-hex to column-hex of the same parity (and back) so the hex
    /// lattice follows a quarter turn. Every other type is unchanged.
    #[must_use]
    pub fn transposed(self) -> Self {
        match self {
            Self::HexRowsOdd => Self::HexColsOdd,
            Self::HexRowsEven => Self::HexColsEven,
            Self::HexColsOdd => Self::HexRowsOdd,
            Self::HexColsEven => Self::HexRowsEven,
            other => other,
        }
    }

    #[must_use]
    pub fn is_hex(self) -> bool {
        matches!(self, Self::HexRowsOdd | Self::HexRowsEven | Self::HexColsOdd | Self::HexColsEven)
    }
}

impl From<u8> for GridType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Gridless,
            1 => Self::Square,
            2 => Self::HexRowsOdd,
            3 => Self::HexRowsEven,
            4 => Self::HexColsOdd,
            5 => Self::HexColsEven,
            other => Self::Other(other),
        }
    }
}

impl From<GridType> for u8 {
    fn from(kind: GridType) -> Self {
        match kind {
            GridType::Gridless => 0,
            GridType::Square => 1,
            GridType::HexRowsOdd => 2,
            GridType::HexRowsEven => 3,
            GridType::HexColsOdd => 4,
            GridType::HexColsEven => 5,
            GridType::Other(value) => value,
        }
    }
}

// =============================================================================
// EMBEDDED KINDS
// =============================================================================

/// Embedded document kinds the rotation understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EmbeddedKind {
    Token,
    Tile,
    Wall,
    AmbientLight,
    AmbientSound,
    Note,
    Drawing,
    MeasuredTemplate,
}

impl EmbeddedKind {
    pub const ALL: [Self; 8] = [
        Self::Token,
        Self::Tile,
        Self::Wall,
        Self::AmbientLight,
        Self::AmbientSound,
        Self::Note,
        Self::Drawing,
        Self::MeasuredTemplate,
    ];

    /// Host document name, e.g. `"AmbientLight"`.
    #[must_use]
    pub fn document_name(self) -> &'static str {
        match self {
            Self::Token => "Token",
            Self::Tile => "Tile",
            Self::Wall => "Wall",
            Self::AmbientLight => "AmbientLight",
            Self::AmbientSound => "AmbientSound",
            Self::Note => "Note",
            Self::Drawing => "Drawing",
            Self::MeasuredTemplate => "MeasuredTemplate",
        }
    }

    /// Key of this kind's collection inside the scene document and payload.
    #[must_use]
    pub fn collection(self) -> &'static str {
        match self {
            Self::Token => "tokens",
            Self::Tile => "tiles",
            Self::Wall => "walls",
            Self::AmbientLight => "lights",
            Self::AmbientSound => "sounds",
            Self::Note => "notes",
            Self::Drawing => "drawings",
            Self::MeasuredTemplate => "templates",
        }
    }

    #[must_use]
    pub fn from_document_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.document_name() == name)
    }
}

impl std::fmt::Display for EmbeddedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.document_name())
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// Token: top-left anchored, width/height in grid cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Token {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub x: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub y: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub width: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub height: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub rotation: f64,
    /// Pixel extent as already rendered by the host, when known. Preferred
    /// over `width * grid.size` because hex grids do not scale linearly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered: Option<PixelExtent>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PixelExtent {
    #[serde(deserialize_with = "null_as_default")]
    pub w: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub h: f64,
}

/// Tile: top-left anchored, width/height in pixels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tile {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub x: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub y: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub width: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub height: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub rotation: f64,
}

/// Drawing: top-left anchored, extent held in its shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Drawing {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub x: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub y: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub shape: DrawingShape,
    #[serde(deserialize_with = "null_as_default")]
    pub rotation: f64,
}

/// Polygon/freehand `points` are relative to the drawing and are left as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawingShape {
    #[serde(deserialize_with = "null_as_default")]
    pub width: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub height: f64,
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<f64>,
}

/// Wall: segment endpoints `[x0, y0, x1, y1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Wall {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub c: [f64; 4],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientLight {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub x: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub y: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub config: LightConfig,
}

/// Only the cone direction matters here; it is optional on the source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
}

/// Point-positioned documents with no other geometry (sounds, notes).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Placement {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub x: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasuredTemplate {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub x: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub y: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub direction: f64,
}

/// One embedded document, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Token(Token),
    Tile(Tile),
    Wall(Wall),
    AmbientLight(AmbientLight),
    AmbientSound(Placement),
    Note(Placement),
    Drawing(Drawing),
    MeasuredTemplate(MeasuredTemplate),
    /// A document whose kind this engine does not know. Never rotated.
    Unknown { kind: String, id: String },
}

impl Entity {
    /// Build a typed entity from a raw document of the named kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not match the kind's schema.
    pub fn from_document(document_name: &str, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let Some(kind) = EmbeddedKind::from_document_name(document_name) else {
            let id = value
                .get("_id")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Ok(Self::Unknown { kind: document_name.to_string(), id });
        };
        Ok(match kind {
            EmbeddedKind::Token => Self::Token(serde_json::from_value(value)?),
            EmbeddedKind::Tile => Self::Tile(serde_json::from_value(value)?),
            EmbeddedKind::Wall => Self::Wall(serde_json::from_value(value)?),
            EmbeddedKind::AmbientLight => Self::AmbientLight(serde_json::from_value(value)?),
            EmbeddedKind::AmbientSound => Self::AmbientSound(serde_json::from_value(value)?),
            EmbeddedKind::Note => Self::Note(serde_json::from_value(value)?),
            EmbeddedKind::Drawing => Self::Drawing(serde_json::from_value(value)?),
            EmbeddedKind::MeasuredTemplate => Self::MeasuredTemplate(serde_json::from_value(value)?),
        })
    }

    /// `None` for unknown kinds.
    #[must_use]
    pub fn kind(&self) -> Option<EmbeddedKind> {
        match self {
            Self::Token(_) => Some(EmbeddedKind::Token),
            Self::Tile(_) => Some(EmbeddedKind::Tile),
            Self::Wall(_) => Some(EmbeddedKind::Wall),
            Self::AmbientLight(_) => Some(EmbeddedKind::AmbientLight),
            Self::AmbientSound(_) => Some(EmbeddedKind::AmbientSound),
            Self::Note(_) => Some(EmbeddedKind::Note),
            Self::Drawing(_) => Some(EmbeddedKind::Drawing),
            Self::MeasuredTemplate(_) => Some(EmbeddedKind::MeasuredTemplate),
            Self::Unknown { .. } => None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Token(t) => &t.id,
            Self::Tile(t) => &t.id,
            Self::Wall(w) => &w.id,
            Self::AmbientLight(l) => &l.id,
            Self::AmbientSound(p) | Self::Note(p) => &p.id,
            Self::Drawing(d) => &d.id,
            Self::MeasuredTemplate(m) => &m.id,
            Self::Unknown { id, .. } => id,
        }
    }
}

#[cfg(test)]
#[path = "scene_test.rs"]
mod tests;
