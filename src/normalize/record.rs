use crate::assets::{AssetResolver, Fetcher};
use crate::error::NormalizeError;
use crate::normalize::extractor::{extract, is_truthy, kind_name, stringify, Field};
use crate::normalize::flatten::flatten;
use crate::normalize::types::{ExportConfig, NormalizedRecord};
use serde_json::{Map, Value};
use tracing::{info, warn};

static EMPTY: Value = Value::Null;

const NO_ITEMS: &[Value] = &[];

/// Outcome of normalizing one raw item
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeOutcome {
    Record(NormalizedRecord),
    Skipped { index: usize, reason: NormalizeError },
}

/// Records produced from a batch of raw items, plus the items that were dropped
#[derive(Debug, Clone, Default)]
pub struct NormalizeReport {
    pub records: Vec<NormalizedRecord>,
    pub skipped: Vec<(usize, NormalizeError)>,
}

/// The parts of a raw item the normalizer reads, shape-checked up front
struct WineView<'a> {
    summary: Option<&'a Map<String, Value>>,
    wine: Option<&'a Map<String, Value>>,
    region: Option<&'a Map<String, Value>>,
    winery: Option<&'a Map<String, Value>>,
    flavor: &'a [Value],
    food: &'a [Value],
    grapes: &'a [Value],
}

impl<'a> WineView<'a> {
    fn parse(item: &'a Value) -> Result<Self, NormalizeError> {
        if !item.is_object() {
            return Err(NormalizeError::NotAnObject {
                found: kind_name(item),
            });
        }

        let summary = object_at(item, "summary")?;
        let vintage = object_at(item, "vintage")?;
        let wine = match vintage {
            Some(vintage) => object_in(vintage, "wine", "vintage.wine")?,
            None => None,
        };

        // Each nested lookup only happens when its parent object is truthy
        let (region, winery, taste, style) = match wine {
            Some(wine) => (
                object_in(wine, "region", "vintage.wine.region")?,
                object_in(wine, "winery", "vintage.wine.winery")?,
                object_in(wine, "taste", "vintage.wine.taste")?,
                object_in(wine, "style", "vintage.wine.style")?,
            ),
            None => (None, None, None, None),
        };

        let flavor = match taste {
            Some(taste) => array_in(taste, "flavor", "vintage.wine.taste.flavor")?,
            None => NO_ITEMS,
        };
        let (food, grapes) = match style {
            Some(style) => (
                array_in(style, "food", "vintage.wine.style.food")?,
                array_in(style, "grapes", "vintage.wine.style.grapes")?,
            ),
            None => (NO_ITEMS, NO_ITEMS),
        };

        Ok(WineView {
            summary,
            wine,
            region,
            winery,
            flavor,
            food,
            grapes,
        })
    }

    fn summary_field(&self, key: &str) -> Field<'a> {
        match self.summary.and_then(|s| s.get(key)) {
            Some(value) => Field::Present(value),
            None => Field::Absent,
        }
    }

    fn summary_text(&self, key: &str) -> String {
        stringify(self.summary_field(key).or(&EMPTY))
    }

    fn bottle_image(&self) -> String {
        match self.wine {
            Some(wine) => stringify(lookup_in(wine, "image.variations.bottle_medium")),
            None => String::new(),
        }
    }
}

/// Falsy values count as missing; any other non-object is a shape error
fn expect_object<'a>(
    value: Option<&'a Value>,
    path: &str,
) -> Result<Option<&'a Map<String, Value>>, NormalizeError> {
    match value {
        Some(v) if !is_truthy(v) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(NormalizeError::UnexpectedShape {
            path: path.to_string(),
            expected: "an object",
            found: kind_name(other),
        }),
        None => Ok(None),
    }
}

fn object_at<'a>(
    item: &'a Value,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, NormalizeError> {
    expect_object(item.get(key), key)
}

fn object_in<'a>(
    parent: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<&'a Map<String, Value>>, NormalizeError> {
    expect_object(parent.get(key), path)
}

fn array_in<'a>(
    parent: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a [Value], NormalizeError> {
    match parent.get(key) {
        Some(v) if !is_truthy(v) => Ok(NO_ITEMS),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(other) => Err(NormalizeError::UnexpectedShape {
            path: path.to_string(),
            expected: "an array",
            found: kind_name(other),
        }),
        None => Ok(NO_ITEMS),
    }
}

fn lookup_in<'a>(map: &'a Map<String, Value>, path: &str) -> &'a Value {
    let (head, rest) = path.split_once('.').unwrap_or((path, ""));
    match map.get(head) {
        Some(value) => extract(value, rest, &EMPTY),
        None => &EMPTY,
    }
}

/// Name of a nested object like `wine.region`, empty when the object is missing
fn nested_name(parent: Option<&Map<String, Value>>) -> String {
    parent
        .and_then(|p| p.get("name"))
        .map(stringify)
        .unwrap_or_default()
}

/// Maps raw listing items onto [`NormalizedRecord`]s, downloading images on
/// the way when an [`AssetResolver`] is attached.
pub struct Normalizer<F> {
    assets: Option<AssetResolver<F>>,
    config: ExportConfig,
}

impl<F: Fetcher> Normalizer<F> {
    pub fn new(assets: Option<AssetResolver<F>>, config: ExportConfig) -> Self {
        Normalizer { assets, config }
    }

    /// Normalize one item. `index` is its position in the input and feeds
    /// the fallback image name.
    pub fn normalize(&self, item: &Value, index: usize) -> Result<NormalizedRecord, NormalizeError> {
        let view = WineView::parse(item)?;

        // The display name falls back to a placeholder; the name column does not
        let display_name = match view.summary_field("name") {
            Field::Present(name) if !name.is_null() => stringify(name),
            _ => format!("wine_{}", index),
        };

        let (image_url, bottle_image_url) = match &self.assets {
            Some(assets) => (
                assets.resolve_asset(&view.summary_text("image"), &display_name),
                assets.resolve_asset(&view.bottle_image(), &format!("bottle_{}", display_name)),
            ),
            None => (String::new(), String::new()),
        };

        Ok(NormalizedRecord {
            name: view.summary_text("name"),
            country: view.summary_text("country"),
            price: view.summary_text("price"),
            rating: view.summary_text("rating"),
            image_url,
            bottle_image_url,
            region: nested_name(view.region),
            winery: nested_name(view.winery),
            flavor: flatten(view.flavor, "group"),
            food_pairing: flatten(view.food, "name"),
            grapes: flatten(view.grapes, "name"),
        })
    }

    /// Normalize one item into an outcome instead of a `Result`
    pub fn outcome(&self, item: &Value, index: usize) -> NormalizeOutcome {
        match self.normalize(item, index) {
            Ok(record) => NormalizeOutcome::Record(record),
            Err(reason) => NormalizeOutcome::Skipped { index, reason },
        }
    }

    /// Normalize every item, dropping the ones that fail
    pub fn normalize_all(&self, items: &[Value]) -> NormalizeReport {
        let mut report = NormalizeReport::default();

        for (idx, item) in items.iter().enumerate() {
            match self.outcome(item, idx) {
                NormalizeOutcome::Record(record) => report.records.push(record),
                NormalizeOutcome::Skipped { index, reason } => {
                    warn!(index, error = %reason, "error processing wine, skipping");
                    report.skipped.push((index, reason));
                }
            }

            let every = self.config.progress_every;
            if every > 0 && (idx + 1) % every == 0 {
                info!("Processed {} wines...", idx + 1);
            }
        }

        report
    }
}
