use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    process,
    thread,
};

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use structopt::StructOpt;
use tracing_subscriber::*;
use vfl_core::{
    aggregation::{named_thetas, train_round, RegressionKind, RegressionSession},
    crypto::{EcCurve, PaillierKeyPair},
    psi::{intersect, PsiSession},
    settings::{AggregationSettings, Settings, TreeSettings},
    tree::{
        serve, DtDataSet, DtFeature, NonTagParty, Request, RequestReceiver, TagParty, Transport,
    },
    Role,
};

#[macro_use]
extern crate tracing;

#[derive(Debug, StructOpt)]
#[structopt(name = "vfl-demo")]
struct Opt {
    /// Path of the configuration file
    #[structopt(short, parse(from_os_str))]
    config_path: PathBuf,
    /// Path of the JSON file with the tables of both parties
    #[structopt(short, parse(from_os_str))]
    data_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct Column {
    name: String,
    values: Vec<String>,
}

#[derive(Debug, Deserialize)]
/// The private table of one party.
struct Table {
    ids: Vec<String>,
    columns: Vec<Column>,
}

impl Table {
    fn data_set(&self) -> anyhow::Result<DtDataSet> {
        if let Some(column) = self
            .columns
            .iter()
            .find(|column| column.values.len() != self.ids.len())
        {
            bail!(
                "column {} has {} values for {} identifiers",
                column.name,
                column.values.len(),
                self.ids.len()
            );
        }
        let features = self
            .columns
            .iter()
            .map(|column| {
                DtFeature::from_column(
                    column.name.as_str(),
                    column.values.iter().map(String::as_str),
                )
            })
            .collect();
        Ok(DtDataSet::new(features)?)
    }

    /// Gets the row positions of the identifiers.
    fn positions(&self, ids: &[String]) -> anyhow::Result<Vec<usize>> {
        let rows = self
            .ids
            .iter()
            .enumerate()
            .map(|(position, id)| (id.as_str(), position))
            .collect::<HashMap<_, _>>();
        ids.iter()
            .map(|id| {
                rows.get(id.as_str())
                    .copied()
                    .ok_or_else(|| anyhow!("identifier {} is not in the table", id))
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct DemoData {
    tag: Table,
    non_tag: Table,
    /// A numeric column of the tag party to fit a regression to.
    #[serde(default)]
    target: Option<String>,
}

fn main() {
    let opt = Opt::from_args();

    let settings = Settings::new(&opt.config_path).unwrap_or_else(|err| {
        eprintln!("{}", err);
        process::exit(1);
    });
    let Settings {
        psi: psi_settings,
        aggregation: aggregation_settings,
        tree: tree_settings,
        log: log_settings,
    } = settings;

    let _fmt_subscriber = FmtSubscriber::builder()
        .with_env_filter(log_settings.filter)
        .with_ansi(true)
        .init();

    if sodiumoxide::init().is_err() {
        error!("failed to initialize the crypto layer");
        process::exit(1);
    }

    if let Err(err) = run(
        &opt.data_path,
        psi_settings.curve,
        &tree_settings,
        &aggregation_settings,
    ) {
        error!("{:#}", err);
        process::exit(1);
    }
}

fn run(
    data_path: &Path,
    curve: EcCurve,
    tree_settings: &TreeSettings,
    aggregation_settings: &AggregationSettings,
) -> anyhow::Result<()> {
    let data = fs::read_to_string(data_path)
        .with_context(|| format!("failed to read {}", data_path.display()))?;
    let data: DemoData = serde_json::from_str(&data).context("invalid data file")?;

    let common = align(&data, curve)?;
    info!(
        "{} of {} tag and {} non-tag samples are shared",
        common.len(),
        data.tag.ids.len(),
        data.non_tag.ids.len()
    );
    let tag_table = data.tag.data_set()?.reindex(&data.tag.positions(&common)?)?;
    let non_tag_table = data.non_tag.data_set()?.reindex(&data.non_tag.positions(&common)?)?;

    train_tree(&tag_table, non_tag_table.clone(), tree_settings)?;
    if let Some(target) = &data.target {
        train_regression(
            &tag_table,
            &non_tag_table,
            target,
            &tree_settings.continuous_features,
            aggregation_settings,
        )?;
    }
    Ok(())
}

/// Runs the two-party PSI and returns the shared identifiers sorted, an order both parties derive
/// on their own.
fn align(data: &DemoData, curve: EcCurve) -> anyhow::Result<Vec<String>> {
    let tag = PsiSession::generate(curve);
    let non_tag = PsiSession::generate(curve);
    let tag_full = non_tag.reencrypt(&tag.encrypt_ids(&data.tag.ids)?)?;
    let non_tag_full = tag.reencrypt(&non_tag.encrypt_ids(&data.non_tag.ids)?)?;

    let mut common = intersect(&data.tag.ids, &tag_full, &[non_tag_full.clone()])?;
    let mut peer_common = intersect(&data.non_tag.ids, &non_tag_full, &[tag_full])?;
    common.sort();
    peer_common.sort();
    if common != peer_common {
        bail!("the parties disagree on the intersection");
    }
    if common.is_empty() {
        bail!("the parties share no samples");
    }
    Ok(common)
}

fn train_tree(
    tag_table: &DtDataSet,
    non_tag_table: DtDataSet,
    settings: &TreeSettings,
) -> anyhow::Result<()> {
    let (receiver, mut transport) = RequestReceiver::new();
    let peer = NonTagParty::new(
        non_tag_table,
        settings.label.as_str(),
        settings.continuous_features.clone(),
    );
    let peer = thread::spawn(move || serve(receiver, peer));

    let outcome = grow_tree(&mut transport, tag_table, settings);
    if let Err(err) = transport.request(Request::Shutdown) {
        warn!("failed to shut down the non-tag party: {}", err);
    }
    let peer = peer.join().map_err(|_| anyhow!("the non-tag party panicked"))?;
    debug!("non-tag model: {}", peer.model().export_json()?);
    outcome
}

fn grow_tree<T: Transport>(
    transport: &mut T,
    table: &DtDataSet,
    settings: &TreeSettings,
) -> anyhow::Result<()> {
    let mut party = TagParty::new(
        table.clone(),
        settings.label.as_str(),
        settings.continuous_features.clone(),
        settings.stop,
    )?;
    party.train(transport)?;
    party.prune(transport, settings.reg_param)?;
    debug!("tag model: {}", party.model().export_json()?);

    let predictions = party.predict_all(transport, table)?;
    let mut hits = 0;
    for (id, prediction) in table.sample_ids().into_iter().zip(&predictions) {
        if party.labels().get(id)? == prediction.as_str() {
            hits += 1;
        }
    }
    info!(
        "tree training accuracy: {}/{} ({:.2}%)",
        hits,
        predictions.len(),
        100.0 * hits as f64 / predictions.len() as f64
    );
    Ok(())
}

/// Standardizes a column to zero mean and unit variance. A constant column maps to zeros.
fn standardize(values: &[f64]) -> Vec<f64> {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let sigma = (values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / n).sqrt();
    values
        .iter()
        .map(|value| if sigma == 0.0 { 0.0 } else { (value - mean) / sigma })
        .collect()
}

fn numeric_column(table: &DtDataSet, name: &str) -> anyhow::Result<Vec<f64>> {
    let feature = table.feature(name)?;
    Ok(table
        .sample_ids()
        .into_iter()
        .map(|id| feature.numeric(id))
        .collect::<Result<_, _>>()?)
}

/// Gets the names and standardized values of the continuous features of a table, column-wise.
fn feature_columns(
    table: &DtDataSet,
    continuous: &[String],
    target: &str,
) -> anyhow::Result<(Vec<String>, Vec<Vec<f64>>)> {
    let names = table
        .features()
        .iter()
        .map(|feature| feature.name.clone())
        .filter(|name| name != target && continuous.contains(name))
        .collect::<Vec<_>>();
    let columns = names
        .iter()
        .map(|name| numeric_column(table, name).map(|values| standardize(&values)))
        .collect::<anyhow::Result<_>>()?;
    Ok((names, columns))
}

/// Transposes columns into rows, prepending and appending the given columns.
fn rows(
    prefix: Option<f64>,
    columns: &[Vec<f64>],
    suffix: Option<&[f64]>,
    len: usize,
) -> Vec<Vec<f64>> {
    (0..len)
        .map(|i| {
            prefix
                .into_iter()
                .chain(columns.iter().map(|column| column[i]))
                .chain(suffix.map(|suffix| suffix[i]))
                .collect()
        })
        .collect()
}

fn train_regression(
    tag_table: &DtDataSet,
    non_tag_table: &DtDataSet,
    target: &str,
    continuous: &[String],
    settings: &AggregationSettings,
) -> anyhow::Result<()> {
    let (tag_names, tag_columns) = feature_columns(tag_table, continuous, target)?;
    let (non_tag_names, non_tag_columns) = feature_columns(non_tag_table, continuous, target)?;
    if non_tag_names.is_empty() {
        bail!("the non-tag party has no continuous features");
    }
    let y = numeric_column(tag_table, target)?;
    let y = match settings.kind {
        RegressionKind::Linear => standardize(&y),
        RegressionKind::Logistic => y,
    };
    let len = tag_table.len();

    info!("generating {} bit Paillier keys", settings.key_bits);
    let tag_keys = PaillierKeyPair::generate(settings.key_bits)?;
    let non_tag_keys = PaillierKeyPair::generate(settings.key_bits)?;
    let tag_public = tag_keys.public.clone();
    let non_tag_public = non_tag_keys.public.clone();
    let accuracy = settings.accuracy()?;
    let regularization = settings.regularization.regularization();

    let mut tag = RegressionSession::new(
        Role::Tag,
        settings.kind,
        accuracy,
        tag_keys,
        non_tag_public,
        rows(Some(1.0), &tag_columns, Some(&y), len),
    )?
    .with_regularization(regularization);
    let mut non_tag = RegressionSession::new(
        Role::NonTag,
        settings.kind,
        accuracy,
        non_tag_keys,
        tag_public,
        rows(None, &non_tag_columns, None, len),
    )?
    .with_regularization(regularization);

    for round in 0..settings.rounds {
        let cost = train_round(&mut tag, &mut non_tag, settings.alpha)?;
        debug!("round {}: cost {:.6}", round, cost);
    }
    info!(
        "{:?} regression on {}: tag {:?}, non-tag {:?}",
        settings.kind,
        target,
        named_thetas(&tag_names, tag.thetas(), Role::Tag)?,
        named_thetas(&non_tag_names, non_tag.thetas(), Role::NonTag)?,
    );
    Ok(())
}
