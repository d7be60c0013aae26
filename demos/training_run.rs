//! Training Run Demo
//!
//! Run with: `cargo run --example training_run`
//!
//! Walks through a simulated training loop: batched tracing across train
//! and validation phases, vector-valued metrics, a metric that appears
//! mid-run, and experiment cleanup through the manager.

use trueno_track::{Manager, MemoryTableStore, MetricValue, TrackerBuilder};

#[tokio::main]
async fn main() -> trueno_track::Result<()> {
    println!("=== Trueno-Track Training Run Demo ===\n");

    let store = MemoryTableStore::new();

    demo_batched_training(&store).await?;
    demo_vector_metrics(&store).await?;
    demo_midrun_metric(&store).await?;
    demo_manager(&store).await?;

    println!("All demos completed successfully!");
    Ok(())
}

async fn demo_batched_training(store: &MemoryTableStore) -> trueno_track::Result<()> {
    println!("1. Batched training loop");

    let tracker = TrackerBuilder::new("resnet50-baseline")
        .flush_every_steps(10)
        .connect(store.clone())
        .await?;

    let steps = 30_u32;
    for step in 0..steps {
        // Simulate decreasing loss and improving accuracy
        let loss = 2.5 / (step as f32 + 1.0) + 0.1;
        let accuracy = 0.5 + 0.015 * step as f32;

        tracker.trace("loss", loss, step, "train").await?;
        tracker.trace("accuracy", accuracy, step, "train").await?;

        if step % 5 == 0 {
            tracker.trace("accuracy", accuracy - 0.04, step, "val").await?;
        }
    }

    println!(
        "   After {} steps: {} rows stored, {} still buffered",
        steps,
        store.row_count("resnet50-baseline").unwrap(),
        tracker.pending_rows().await
    );

    tracker.flush().await?;
    println!(
        "   After flush:    {} rows stored",
        store.row_count("resnet50-baseline").unwrap()
    );

    println!("   Metrics: {:?}\n", tracker.metrics().await?);
    Ok(())
}

async fn demo_vector_metrics(store: &MemoryTableStore) -> trueno_track::Result<()> {
    println!("2. Vector-valued metrics");

    let tracker = TrackerBuilder::new("per-class-eval")
        .connect(store.clone())
        .await?;

    // One cell per class, stored as a single array column.
    let per_class_recall = vec![0.91_f32, 0.84, 0.77, 0.95];
    tracker
        .multi_trace(
            [
                ("recall_per_class", MetricValue::from(per_class_recall)),
                ("macro_f1", MetricValue::from(0.87_f32)),
            ],
            0,
            "val",
        )
        .await?;

    for column in store.columns("per-class-eval").unwrap() {
        println!("   {} {}", column.name(), column.column_type());
    }
    println!();
    Ok(())
}

async fn demo_midrun_metric(store: &MemoryTableStore) -> trueno_track::Result<()> {
    println!("3. Metric introduced mid-run");

    let tracker = TrackerBuilder::new("grad-watch")
        .flush_every_steps(4)
        .connect(store.clone())
        .await?;

    for step in 0..8 {
        tracker.trace("loss", 1.0_f32, step, "train").await?;
        // Gradient clipping switched on at step 5; the column appears
        // in the table schema on the flush that carries it.
        if step >= 5 {
            tracker.trace("grad_norm", 0.3_f32, step, "train").await?;
        }
    }
    tracker.flush().await?;

    println!("   Metrics after run: {:?}\n", tracker.metrics().await?);
    Ok(())
}

async fn demo_manager(store: &MemoryTableStore) -> trueno_track::Result<()> {
    println!("4. Experiment management");

    let manager = Manager::new(store.clone());
    println!("   Experiments: {:?}", manager.list_experiments().await?);

    manager.remove_experiment("grad-watch").await?;
    println!(
        "   After removing grad-watch: {:?}\n",
        manager.list_experiments().await?
    );
    Ok(())
}
