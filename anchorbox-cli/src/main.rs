mod labels;

use anchorbox::{
    AnchorConfig, BatchOutputs, Detection, DetectionBatch, Detector, DetectorConfig, PolicyKind,
    ScaleFactors, SelectionPolicy,
};
use clap::Parser;
use labels::LabelMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "AnchorBox CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Override the model outputs file named in the config.
    #[arg(short, long, value_name = "FILE")]
    outputs: Option<PathBuf>,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PolicyConfig {
    Visualization,
    Production,
}

impl From<PolicyConfig> for PolicyKind {
    fn from(value: PolicyConfig) -> Self {
        match value {
            PolicyConfig::Visualization => PolicyKind::Visualization,
            PolicyConfig::Production => PolicyKind::Production,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
struct PolicyJson {
    objectness_threshold: f32,
    iou_threshold: f32,
    max_output: usize,
    top_k: Option<usize>,
}

impl From<SelectionPolicy> for PolicyJson {
    fn from(value: SelectionPolicy) -> Self {
        Self {
            objectness_threshold: value.objectness_threshold,
            iou_threshold: value.iou_threshold,
            max_output: value.max_output,
            top_k: value.top_k,
        }
    }
}

impl From<PolicyJson> for SelectionPolicy {
    fn from(value: PolicyJson) -> Self {
        Self {
            objectness_threshold: value.objectness_threshold,
            iou_threshold: value.iou_threshold,
            max_output: value.max_output,
            top_k: value.top_k,
        }
    }
}

impl Default for PolicyJson {
    fn default() -> Self {
        SelectionPolicy::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    outputs_path: String,
    output_path: Option<String>,
    labels_path: Option<String>,
    policy: PolicyConfig,
    input_shape: [usize; 2],
    base_anchor_sizes: Vec<f32>,
    anchor_strides: Vec<usize>,
    anchor_scales: Vec<f32>,
    anchor_ratios: Vec<f32>,
    scale_factors: [f32; 4],
    top_k: usize,
    num_classes: Option<usize>,
    clip_boxes: bool,
    parallel: bool,
    visualization: PolicyJson,
    production: PolicyJson,
}

impl Default for Config {
    fn default() -> Self {
        let sf = ScaleFactors::default();
        let cfg = DetectorConfig::default();
        Self {
            outputs_path: String::new(),
            output_path: None,
            labels_path: None,
            policy: PolicyConfig::Production,
            input_shape: [0, 0],
            base_anchor_sizes: Vec::new(),
            anchor_strides: Vec::new(),
            anchor_scales: vec![1.0],
            anchor_ratios: vec![1.0],
            scale_factors: [sf.y, sf.x, sf.h, sf.w],
            top_k: cfg.top_k,
            num_classes: cfg.num_classes,
            clip_boxes: cfg.clip_boxes,
            parallel: cfg.parallel,
            visualization: cfg.visualization.into(),
            production: cfg.production.into(),
        }
    }
}

/// Raw model outputs, one entry per crop.
#[derive(Debug, Deserialize)]
struct ModelOutputsJson {
    class_probs: Vec<Vec<Vec<f32>>>,
    deltas: Vec<Vec<Vec<f32>>>,
}

#[derive(Debug, Serialize)]
struct DetectionRecord {
    /// `[y1, x1, y2, x2]` in network input pixels; `-1` for sentinel rows.
    bbox: [f32; 4],
    class_ids: Vec<u32>,
    class_scores: Vec<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    labels: Vec<String>,
    sentinel: bool,
}

#[derive(Debug, Serialize)]
struct Output {
    num_anchors: usize,
    crops: Vec<Vec<DetectionRecord>>,
}

fn to_record(
    det: &Detection,
    img_h: f32,
    img_w: f32,
    labels: Option<&LabelMap>,
) -> DetectionRecord {
    let sentinel = det.is_sentinel();
    let bbox = if sentinel {
        det.bbox
    } else {
        det.bbox.scaled(img_h, img_w)
    };
    let labels = match labels {
        Some(map) if !sentinel => det
            .class_ids
            .iter()
            .map(|&id| map.name(id).unwrap_or("unknown").to_string())
            .collect(),
        _ => Vec::new(),
    };
    DetectionRecord {
        bbox: bbox.to_array(),
        class_ids: det.class_ids.clone(),
        class_scores: det.class_scores.clone(),
        labels,
        sentinel,
    }
}

fn to_output(
    batch: &DetectionBatch,
    num_anchors: usize,
    img_h: f32,
    img_w: f32,
    labels: Option<&LabelMap>,
) -> Output {
    let crops = batch
        .iter()
        .map(|crop| {
            crop.iter()
                .map(|det| to_record(det, img_h, img_w, labels))
                .collect()
        })
        .collect();
    Output { num_anchors, crops }
}

/// Model outputs flattened crop-major, with the geometry they were checked against.
#[derive(Debug)]
struct FlatOutputs {
    class_probs: Vec<f32>,
    deltas: Vec<f32>,
    num_crops: usize,
    num_anchors: usize,
    num_classes: usize,
}

/// Flattens nested per-crop rows, checking that every crop has `rows` rows of
/// `width` values each.
fn flatten_rows(
    crops: Vec<Vec<Vec<f32>>>,
    rows: usize,
    width: usize,
    what: &str,
) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
    let mut flat = Vec::with_capacity(crops.len() * rows * width);
    for (crop_idx, crop) in crops.into_iter().enumerate() {
        if crop.len() != rows {
            return Err(format!(
                "{what}: crop {crop_idx} has {} rows, expected {rows}",
                crop.len()
            )
            .into());
        }
        for (row_idx, row) in crop.into_iter().enumerate() {
            if row.len() != width {
                return Err(format!(
                    "{what}: crop {crop_idx} row {row_idx} has {} values, expected {width}",
                    row.len()
                )
                .into());
            }
            flat.extend(row);
        }
    }
    Ok(flat)
}

/// Checks the nested model outputs for a uniform crop geometry and flattens them.
fn flatten_outputs(raw: ModelOutputsJson) -> Result<FlatOutputs, Box<dyn std::error::Error>> {
    let num_crops = raw.class_probs.len();
    if raw.deltas.len() != num_crops {
        return Err(format!(
            "class_probs has {num_crops} crops but deltas has {}",
            raw.deltas.len()
        )
        .into());
    }
    let num_anchors = raw
        .class_probs
        .first()
        .map(Vec::len)
        .ok_or("class_probs must contain at least one crop")?;
    let prob_width = raw
        .class_probs
        .first()
        .and_then(|rows| rows.first())
        .map(Vec::len)
        .ok_or("class_probs must contain at least one row")?;
    if prob_width < 2 {
        return Err("class probability rows need a background and at least one class".into());
    }
    let class_probs = flatten_rows(raw.class_probs, num_anchors, prob_width, "class_probs")?;
    let deltas = flatten_rows(raw.deltas, num_anchors, 4, "deltas")?;
    Ok(FlatOutputs {
        class_probs,
        deltas,
        num_crops,
        num_anchors,
        num_classes: prob_width - 1,
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("anchorbox=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    let outputs_path = match cli.outputs {
        Some(path) => path,
        None if !config.outputs_path.is_empty() => PathBuf::from(&config.outputs_path),
        None => return Err("outputs_path must be set in the config or via --outputs".into()),
    };

    let [input_h, input_w] = config.input_shape;
    let anchor_cfg = AnchorConfig::from_level_lists(
        input_h,
        input_w,
        &config.base_anchor_sizes,
        &config.anchor_strides,
        config.anchor_scales.clone(),
        config.anchor_ratios.clone(),
    )?;
    let detector_cfg = DetectorConfig {
        scale_factors: ScaleFactors::from_array(config.scale_factors),
        top_k: config.top_k,
        num_classes: config.num_classes,
        visualization: config.visualization.into(),
        production: config.production.into(),
        clip_boxes: config.clip_boxes,
        parallel: config.parallel,
    };
    let detector = Detector::new(&anchor_cfg)?.with_config(detector_cfg)?;
    let num_anchors = detector.anchors().len();
    tracing::info!(num_anchors, "anchors generated");

    let labels = match &config.labels_path {
        Some(path) => {
            let map = LabelMap::load(path)?;
            tracing::info!(count = map.len(), "labels loaded");
            Some(map)
        }
        None => None,
    };

    let outputs_text = fs::read_to_string(&outputs_path)?;
    let raw: ModelOutputsJson = serde_json::from_str(&outputs_text)?;
    let flat = flatten_outputs(raw)?;
    let batch_outputs = BatchOutputs::new(
        &flat.class_probs,
        &flat.deltas,
        flat.num_crops,
        flat.num_anchors,
        flat.num_classes,
    )?;

    let started = Instant::now();
    let batch = detector.detect(&batch_outputs, config.policy.into())?;
    tracing::info!(
        crops = batch.len(),
        rows = batch.total_rows(),
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "post-processing done"
    );

    let output = to_output(
        &batch,
        num_anchors,
        input_h as f32,
        input_w as f32,
        labels.as_ref(),
    );
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
