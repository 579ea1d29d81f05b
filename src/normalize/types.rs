use serde::{Deserialize, Serialize};

/// One wine listing flattened into fixed text columns - one row in the export
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub name: String,
    pub country: String,
    pub price: String,
    pub rating: String,

    /// Local path of the downloaded label image, or empty
    pub image_url: String,

    /// Local path of the downloaded bottle image, or empty
    pub bottle_image_url: String,

    pub region: String,
    pub winery: String,

    /// Flavor group names joined with ", "
    pub flavor: String,

    /// Food names joined with ", "
    pub food_pairing: String,

    /// Grape names joined with ", "
    pub grapes: String,
}

impl NormalizedRecord {
    /// Value of a single export column
    pub fn column(&self, column: Column) -> &str {
        match column {
            Column::Name => &self.name,
            Column::Country => &self.country,
            Column::Price => &self.price,
            Column::Rating => &self.rating,
            Column::Image | Column::ImageUrl => &self.image_url,
            Column::BottleImageUrl => &self.bottle_image_url,
            Column::Region => &self.region,
            Column::Winery => &self.winery,
            Column::Flavor => &self.flavor,
            Column::FoodPairing => &self.food_pairing,
            Column::Grapes => &self.grapes,
        }
    }
}

/// A column of the exported table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Name,
    Country,
    Price,
    Rating,
    /// Legacy header label. Carries the label image path.
    Image,
    ImageUrl,
    BottleImageUrl,
    Region,
    Winery,
    Flavor,
    FoodPairing,
    Grapes,
}

impl Column {
    pub fn header(self) -> &'static str {
        match self {
            Column::Name => "name",
            Column::Country => "country",
            Column::Price => "price",
            Column::Rating => "rating",
            Column::Image => "image",
            Column::ImageUrl => "image_url",
            Column::BottleImageUrl => "bottle_image_url",
            Column::Region => "region",
            Column::Winery => "winery",
            Column::Flavor => "flavor",
            Column::FoodPairing => "food_pairing",
            Column::Grapes => "grapes",
        }
    }
}

const LEGACY_COLUMNS: [Column; 10] = [
    Column::Name,
    Column::Country,
    Column::Price,
    Column::Rating,
    Column::Image,
    Column::Region,
    Column::Winery,
    Column::Flavor,
    Column::FoodPairing,
    Column::Grapes,
];

const EXTENDED_COLUMNS: [Column; 11] = [
    Column::Name,
    Column::Country,
    Column::Price,
    Column::Rating,
    Column::ImageUrl,
    Column::BottleImageUrl,
    Column::Region,
    Column::Winery,
    Column::Flavor,
    Column::FoodPairing,
    Column::Grapes,
];

/// Which header the export writes
///
/// The legacy header has a single `image` column although records carry two
/// image paths. `Legacy` keeps that header and drops `bottle_image_url`;
/// `Extended` exports both paths under their own names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeaderLayout {
    #[default]
    Legacy,
    Extended,
}

impl HeaderLayout {
    pub fn columns(self) -> &'static [Column] {
        match self {
            HeaderLayout::Legacy => &LEGACY_COLUMNS,
            HeaderLayout::Extended => &EXTENDED_COLUMNS,
        }
    }
}

/// Character set values are rendered into before writing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// Non-ASCII characters are replaced with `?`
    Ascii,
}

impl TextEncoding {
    /// Render a value in this encoding. Never fails; unrepresentable
    /// characters are degraded.
    pub fn render<'a>(self, value: &'a str) -> std::borrow::Cow<'a, str> {
        match self {
            TextEncoding::Utf8 => std::borrow::Cow::Borrowed(value),
            TextEncoding::Ascii if value.is_ascii() => std::borrow::Cow::Borrowed(value),
            TextEncoding::Ascii => std::borrow::Cow::Owned(
                value
                    .chars()
                    .map(|c| if c.is_ascii() { c } else { '?' })
                    .collect(),
            ),
        }
    }
}

/// Configuration for normalization and export
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Header layout of the exported table
    pub layout: HeaderLayout,

    /// Encoding values are degraded to
    pub encoding: TextEncoding,

    /// Log a progress line every this many items (0 = never)
    pub progress_every: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            layout: HeaderLayout::Legacy,
            encoding: TextEncoding::Utf8,
            progress_every: 100,
        }
    }
}
