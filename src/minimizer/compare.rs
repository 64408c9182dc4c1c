//! Input resolution and the run-both-backends-and-compare round.

use anyhow::anyhow;

use crate::backend::{BackendRunner, BackendSide, Comparator};
use crate::graph::{RunOutput, SplitGraph};

use super::{Minimizer, MinimizerError, ResultKey};

impl<V, A, B, C> Minimizer<V, A, B, C>
where
    V: Clone,
    A: BackendRunner<V>,
    B: BackendRunner<V>,
    C: Comparator<V>,
{
    /// Resolves the concrete input lists for one round of the unit at
    /// `unit_index`.
    ///
    /// Prefers cached outputs from earlier rounds; when any placeholder is
    /// missing from the A-side cache, falls back to a single live capture
    /// of the full graph on the sample input, used for both sides. With
    /// `accumulate_error` disabled, backend B always receives the A-side
    /// list so every round starts from clean reference inputs.
    pub(crate) fn resolve_inputs(
        &mut self,
        split: &SplitGraph<V>,
        unit_index: usize,
    ) -> Result<(Vec<V>, Vec<V>), MinimizerError> {
        let names: Vec<String> = split.children[unit_index]
            .graph
            .placeholder_names()
            .into_iter()
            .map(str::to_owned)
            .collect();

        let (a_input, b_input) = if names.iter().all(|name| self.a_outputs.contains_key(name)) {
            let a_input = names
                .iter()
                .map(|name| self.a_outputs[name].clone())
                .collect::<Vec<_>>();
            let b_input = names
                .iter()
                .map(|name| self.b_outputs[name].clone())
                .collect::<Vec<_>>();
            (a_input, b_input)
        } else {
            if self.settings.accumulate_error {
                log::warn!("no cached outputs for {names:?}; falling back to live capture");
            }
            let captured = self
                .graph
                .capture_values(&self.sample_input, &names)
                .map_err(|source| MinimizerError::Capture { source })?;
            self.live_captures += 1;
            (captured.clone(), captured)
        };

        if !self.settings.accumulate_error {
            return Ok((a_input.clone(), a_input));
        }
        Ok((a_input, b_input))
    }

    /// Runs one comparison round on the unit at `unit_index`.
    ///
    /// A non-empty `output_names` rewires the unit to emit exactly those
    /// internal values before execution, which lets a strategy inspect an
    /// intermediate without re-extracting. Both backends' outputs are
    /// cached per emitted name; the comparator's score lands in the result
    /// cache under the round's output-name tuple.
    pub(crate) fn run_and_compare(
        &mut self,
        split: &mut SplitGraph<V>,
        unit_index: usize,
        output_names: &[String],
    ) -> Result<(), MinimizerError> {
        let (a_input, b_input) = self.resolve_inputs(&*split, unit_index)?;

        let unit = &mut split.children[unit_index].graph;
        if !output_names.is_empty() {
            unit.rewire_output(output_names)
                .map_err(|err| MinimizerError::BadUnit {
                    reason: err.to_string(),
                })?;
        }
        let result_key: ResultKey =
            unit.output_names()
                .map_err(|err| MinimizerError::BadUnit {
                    reason: err.to_string(),
                })?;

        let unit = &split.children[unit_index].graph;
        let a_result =
            self.run_a
                .run(unit, &a_input)
                .map_err(|source| MinimizerError::RunFunc {
                    backend: BackendSide::A,
                    source,
                })?;
        let b_result =
            self.run_b
                .run(unit, &b_input)
                .map_err(|source| MinimizerError::RunFunc {
                    backend: BackendSide::B,
                    source,
                })?;
        self.store_outputs(&a_result, &b_result, &result_key)?;

        let (score, passed) = self.compare.compare(&a_result, &b_result, &result_key);
        self.results.insert(result_key.clone(), score);
        log::debug!("round {result_key:?}: score {score}, passed {passed}");
        if !passed {
            return Err(MinimizerError::ResultMismatch { key: result_key });
        }
        Ok(())
    }

    /// Stores both backends' outputs into the per-name caches so that
    /// later rounds consuming these values can skip the live capture.
    fn store_outputs(
        &mut self,
        a_result: &RunOutput<V>,
        b_result: &RunOutput<V>,
        key: &[String],
    ) -> Result<(), MinimizerError> {
        for (side, result) in [(BackendSide::A, a_result), (BackendSide::B, b_result)] {
            if result.len() != key.len() {
                return Err(MinimizerError::RunFunc {
                    backend: side,
                    source: anyhow!(
                        "backend returned {} value(s) for {} output name(s)",
                        result.len(),
                        key.len()
                    ),
                });
            }
        }
        for (name, value) in key.iter().zip(a_result.as_slice()) {
            self.a_outputs.insert(name.clone(), value.clone());
        }
        for (name, value) in key.iter().zip(b_result.as_slice()) {
            self.b_outputs.insert(name.clone(), value.clone());
        }
        Ok(())
    }
}
