// ============================================================
// Layer 6 — Prediction Output Writer
// ============================================================
// Fills the evaluation template with predictions.
//
// Each template line names one (paragraph, sentence, entity)
// cell and carries the placeholder state NONE:
//
//   12 \t 3 \t ironore \t NONE
//
// and becomes
//
//   12 \t 3 \t ironore \t MOVE \t water \t soil
//
// Sentence ids start at 1. The template decides the order and
// the coverage of the output; predictions the template never
// asks for are simply not written.

use anyhow::{bail, ensure, Context, Result};
use std::{
    collections::HashMap,
    fs,
    io::{BufWriter, Write},
    path::Path,
};

use crate::domain::{consistency::InstancePrediction, instance::instance_key};

const PLACEHOLDER: &str = "NONE";

/// Predictions indexed by "<para_id>-<entity>".
pub fn index_predictions(predictions: Vec<InstancePrediction>) -> HashMap<String, InstancePrediction> {
    predictions
        .into_iter()
        .map(|p| (instance_key(p.para_id, &p.entity), p))
        .collect()
}

/// Fill one template line (without its trailing newline).
pub fn fill_template_line(
    line:        &str,
    predictions: &HashMap<String, InstancePrediction>,
) -> Result<String> {
    let fields: Vec<&str> = line.trim().split('\t').collect();
    ensure!(
        fields.len() == 4 && fields[3] == PLACEHOLDER,
        "Expected 'para_id<TAB>sent_id<TAB>entity<TAB>NONE', got '{line}'"
    );

    let para_id: u32 = fields[0]
        .parse()
        .with_context(|| format!("Bad paragraph id '{}'", fields[0]))?;
    let sent_id: usize = fields[1]
        .parse()
        .with_context(|| format!("Bad sentence id '{}'", fields[1]))?;
    let entity = fields[2];

    let key = instance_key(para_id, entity);
    let Some(pred) = predictions.get(&key) else {
        bail!("No prediction for paragraph {para_id}, entity '{entity}'");
    };
    if sent_id == 0 || sent_id > pred.total_sents {
        bail!(
            "Sentence id {sent_id} out of range for paragraph {para_id} ({} sentences)",
            pred.total_sents
        );
    }

    let s = &pred.sentences[sent_id - 1];
    Ok([
        fields[0],
        fields[1],
        entity,
        s.state.as_str(),
        s.loc_before.as_str(),
        s.loc_after.as_str(),
    ]
    .join("\t"))
}

pub struct PredictionWriter;

impl PredictionWriter {
    /// Read `template`, fill every non-empty line and write `output`.
    /// Returns the number of lines written.
    pub fn write(
        template:    &Path,
        output:      &Path,
        predictions: &HashMap<String, InstancePrediction>,
    ) -> Result<usize> {
        let text = fs::read_to_string(template)
            .with_context(|| format!("Cannot read template '{}'", template.display()))?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
        let file = fs::File::create(output)
            .with_context(|| format!("Cannot create '{}'", output.display()))?;
        let mut out = BufWriter::new(file);

        let mut written = 0usize;
        for (n, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let filled = fill_template_line(line, predictions)
                .with_context(|| format!("{}:{}", template.display(), n + 1))?;
            writeln!(out, "{filled}")?;
            written += 1;
        }
        out.flush()?;

        tracing::info!("Wrote {written} predictions to '{}'", output.display());
        Ok(written)
    }
}
