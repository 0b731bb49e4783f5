// ============================================================
// Layer 5 - Training Loop
// ============================================================
// Epoch / minibatch loop around QaPipeline:
//
//   for each epoch:
//     shuffled minibatches -> pipeline.train   (one Adam step each)
//     average train loss over batches
//     validation batches   -> pipeline.evaluate
//     metrics.csv row, checkpoint for the epoch
//   statistics.json once all epochs are done
//
// The runtime backend is Autodiff<Wgpu>. The loop itself is
// generic over any AutodiffBackend and optimizer, which is how
// the tests drive it on NdArray.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use std::{path::Path, sync::Arc, time::Instant};

use anyhow::{Context, Result};
use burn::{
    backend::{wgpu::WgpuDevice, Autodiff, Wgpu},
    data::dataloader::{DataLoader, DataLoaderBuilder},
    optim::{AdamConfig, Optimizer, SgdConfig},
    tensor::backend::{AutodiffBackend, Backend},
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::SquadBatcher, dataset::SquadDataset};
use crate::domain::{batch::SquadBatch, options::OptimizerKind};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger, TrainingStatistics},
};
use crate::ml::{
    embedding::EmbeddingTable,
    model::SquadModel,
    pipeline::{PipelineConfig, QaPipeline},
};

pub type TrainBackend = Autodiff<Wgpu>;

pub fn run_training(
    cfg:             &TrainConfig,
    pipeline_config: PipelineConfig,
    train_dataset:   SquadDataset,
    val_dataset:     SquadDataset,
    ckpt_manager:    CheckpointManager,
) -> Result<TrainingStatistics> {
    let device = WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    TrainBackend::seed(cfg.seed);

    let embeddings = EmbeddingTable::<TrainBackend>::from_path(&cfg.embed_path, cfg.embed_dim, &device);

    // Both optimizers go through the same generic loop
    match pipeline_config.optimizer {
        OptimizerKind::Adam => {
            let optim = AdamConfig::new().with_epsilon(1e-8).init();
            let pipeline = QaPipeline::new(pipeline_config, embeddings, optim, &device)?;
            train_loop(cfg, pipeline, train_dataset, val_dataset, &ckpt_manager)
        }
        OptimizerKind::Sgd => {
            let optim = SgdConfig::new().init();
            let pipeline = QaPipeline::new(pipeline_config, embeddings, optim, &device)?;
            train_loop(cfg, pipeline, train_dataset, val_dataset, &ckpt_manager)
        }
    }
}

/// Restore the latest checkpoint and return its mean per-batch loss on `dataset`.
pub fn run_evaluation(
    cfg:          &TrainConfig,
    dataset:      SquadDataset,
    ckpt_manager: &CheckpointManager,
) -> Result<f64> {
    let pipeline_config = cfg.pipeline_config().context("Invalid saved configuration")?;
    let device = WgpuDevice::default();
    let embeddings = EmbeddingTable::<TrainBackend>::from_path(&cfg.embed_path, cfg.embed_dim, &device);

    match pipeline_config.optimizer {
        OptimizerKind::Adam => {
            let optim = AdamConfig::new().with_epsilon(1e-8).init();
            let pipeline = QaPipeline::new(pipeline_config, embeddings, optim, &device)?
                .restore_from_checkpoint(ckpt_manager.dir())?;
            mean_loss(&pipeline, &*loader(dataset, cfg.batch_size, None))
        }
        OptimizerKind::Sgd => {
            let optim = SgdConfig::new().init();
            let pipeline = QaPipeline::new(pipeline_config, embeddings, optim, &device)?
                .restore_from_checkpoint(ckpt_manager.dir())?;
            mean_loss(&pipeline, &*loader(dataset, cfg.batch_size, None))
        }
    }
}

pub fn train_loop<B, O>(
    cfg:           &TrainConfig,
    mut pipeline:  QaPipeline<B, O>,
    train_dataset: SquadDataset,
    val_dataset:   SquadDataset,
    ckpt_manager:  &CheckpointManager,
) -> Result<TrainingStatistics>
where
    B: AutodiffBackend,
    O: Optimizer<SquadModel<B>, B>,
{
    let save_dir = Path::new(&cfg.save_dir);

    // ── Resume ────────────────────────────────────────────────────────────────
    let mut first_epoch = 1;
    let mut stats = TrainingStatistics::new(pipeline.num_parameters());
    if cfg.resume && ckpt_manager.has_checkpoint() {
        let last = ckpt_manager.latest_epoch()?;
        pipeline = pipeline.restore_from_checkpoint(ckpt_manager.dir())?;
        stats = TrainingStatistics::load(save_dir)?.unwrap_or(stats);
        first_epoch = last + 1;
        tracing::info!("Resuming after epoch {}", last);
    }
    tracing::info!("Total params: {}", pipeline.num_parameters());

    // ── Data loaders ──────────────────────────────────────────────────────────
    let num_examples = train_dataset.example_count();
    let num_batches  = num_examples.div_ceil(cfg.batch_size);
    let train_loader = loader(train_dataset, cfg.batch_size, Some(cfg.seed));
    let val_loader   = loader(val_dataset, cfg.batch_size, None);

    let metrics = MetricsLogger::new(save_dir)?;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in first_epoch..=cfg.epochs {
        tracing::info!("Epoch: {} / {}", epoch, cfg.epochs);
        let epoch_start = Instant::now();

        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let tic  = Instant::now();
            let loss = pipeline.train(&batch)?;
            train_loss_sum += loss;
            train_batches  += 1;

            tracing::debug!(
                "Batch {} of {} === loss={:.7} time={:.2}s",
                train_batches,
                num_batches,
                loss,
                tic.elapsed().as_secs_f64()
            );
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else { f64::NAN };

        let avg_val_loss = mean_loss(&pipeline, &*val_loader)?;

        tracing::info!(
            "Epoch {:>3}/{} | train_loss={:.7} | val_loss={:.7} | {:.1}s",
            epoch,
            cfg.epochs,
            avg_train_loss,
            avg_val_loss,
            epoch_start.elapsed().as_secs_f64()
        );

        let m = EpochMetrics::new(epoch, avg_train_loss, avg_val_loss);
        metrics.log(&m)?;
        stats.record(&m);

        pipeline.checkpoint(ckpt_manager.dir(), epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);
    }

    if first_epoch > cfg.epochs {
        tracing::warn!("Checkpoint is already at epoch {}; nothing to train", first_epoch - 1);
    }

    stats.save(save_dir)?;
    tracing::info!("Training complete!");
    Ok(stats)
}

/// Mean of per-batch evaluate losses; NaN when there are no batches.
pub fn mean_loss<B, O>(
    pipeline: &QaPipeline<B, O>,
    loader:   &dyn DataLoader<SquadBatch>,
) -> Result<f64>
where
    B: AutodiffBackend,
    O: Optimizer<SquadModel<B>, B>,
{
    let mut sum = 0.0f64;
    let mut batches = 0usize;
    for batch in loader.iter() {
        sum += pipeline.evaluate(&batch)?;
        batches += 1;
    }
    Ok(if batches > 0 { sum / batches as f64 } else { f64::NAN })
}

fn loader(dataset: SquadDataset, batch_size: usize, shuffle: Option<u64>) -> Arc<dyn DataLoader<SquadBatch>> {
    let builder = DataLoaderBuilder::new(SquadBatcher::new())
        .batch_size(batch_size)
        .num_workers(1);
    match shuffle {
        Some(seed) => builder.shuffle(seed).build(dataset),
        None       => builder.build(dataset),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use ndarray::Array2;

    use crate::domain::example::SquadExample;

    type TestBackend = Autodiff<NdArray>;

    fn examples(n: usize) -> Vec<SquadExample> {
        (0..n)
            .map(|i| {
                let q = vec![1 + (i % 5) as u32, 2, 3, 0];
                let c = vec![4, 5 + (i % 3) as u32, 6, 7, 0];
                let a = vec![0, 1, 1, 0, 0];
                SquadExample::new(q, c, a, 3, 4).unwrap()
            })
            .collect()
    }

    fn config(save_dir: &Path, epochs: usize) -> TrainConfig {
        TrainConfig {
            save_dir: save_dir.display().to_string(),
            hidden_size: 6,
            batch_size: 4,
            embed_dim: 3,
            epochs,
            layers: 1,
            cell_type: "gru".into(),
            variant: "baseline".into(),
            val_path: None,
            ..TrainConfig::default()
        }
    }

    fn pipeline(cfg: &TrainConfig) -> QaPipeline<TestBackend, impl Optimizer<SquadModel<TestBackend>, TestBackend>> {
        let device = Default::default();
        let matrix = Array2::from_shape_fn((10, 3), |(i, j)| (i as f32 - j as f32) / 10.0);
        let embeddings = EmbeddingTable::from_matrix(matrix, &device);
        let optim = AdamConfig::new().init::<TestBackend, SquadModel<TestBackend>>();
        QaPipeline::new(cfg.pipeline_config().unwrap(), embeddings, optim, &device).unwrap()
    }

    #[test]
    fn test_loop_writes_every_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), 2);
        let ckpt = CheckpointManager::new(dir.path());

        let stats = train_loop(
            &cfg,
            pipeline(&cfg),
            SquadDataset::new(examples(10)),
            SquadDataset::new(examples(3)),
            &ckpt,
        )
        .unwrap();

        assert_eq!(stats.epoch_losses.len(), 2);
        assert!(stats.epoch_losses.iter().all(|l| l.is_finite()));
        assert!(stats.val_losses.iter().all(Option::is_some));
        for name in [
            "model_epoch_1.mpk.gz",
            "model_epoch_2.mpk.gz",
            "optim_epoch_2.mpk.gz",
            "latest_epoch.json",
            "metrics.csv",
            "statistics.json",
        ] {
            assert!(dir.path().join(name).is_file(), "missing {name}");
        }
        assert_eq!(ckpt.latest_epoch().unwrap(), 2);
    }

    #[test]
    fn test_resume_continues_after_latest_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path());

        let cfg = config(dir.path(), 1);
        train_loop(&cfg, pipeline(&cfg), SquadDataset::new(examples(8)), SquadDataset::new(examples(2)), &ckpt)
            .unwrap();

        let cfg = TrainConfig { resume: true, ..config(dir.path(), 3) };
        let stats = train_loop(
            &cfg,
            pipeline(&cfg),
            SquadDataset::new(examples(8)),
            SquadDataset::new(examples(2)),
            &ckpt,
        )
        .unwrap();

        assert_eq!(stats.epoch_losses.len(), 3);
        assert_eq!(ckpt.latest_epoch().unwrap(), 3);
        let csv = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 4);
    }

    #[test]
    fn test_empty_validation_reports_nan() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), 1);
        let ckpt = CheckpointManager::new(dir.path());
        let stats = train_loop(&cfg, pipeline(&cfg), SquadDataset::new(examples(4)), SquadDataset::new(Vec::new()), &ckpt)
            .unwrap();
        assert_eq!(stats.val_losses, vec![None]);
    }
}
