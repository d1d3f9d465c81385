//! Terminal summary for a completed run (§4.7): per-worker throughput
//! tables plus a latency-quantile table built from every subscriber's
//! histogram.

use colored::Colorize;

use flotilla_core::ResultContainer;

/// Prints the producer table, the consumer table, and the latency table for
/// one completed run, in that order.
pub fn print_summary(results: &[ResultContainer]) {
    print_worker_table("Producers", results, |r| &r.publisher_results);
    println!();
    print_worker_table("Consumers", results, |r| &r.subscriber_results);
    println!();
    print_latency_table(results);
}

fn print_worker_table(
    title: &str,
    results: &[ResultContainer],
    workers: impl Fn(&ResultContainer) -> &Vec<flotilla_core::WorkerResult>,
) {
    println!("{}", title.bold().underline());
    println!("{:<24} {:>6} {:>14} {:>18}", "peer", "worker", "duration (ms)", "msgs/sec");

    let mut total_throughput = 0.0f64;
    let mut worker_count = 0usize;

    for result in results {
        for (id, worker) in workers(result).iter().enumerate() {
            if worker.is_error() {
                let reason = worker.error.as_deref().unwrap_or("unknown error");
                println!(
                    "{:<24} {:>6} {}",
                    result.peer_endpoint,
                    id,
                    format!("error: {reason}").red()
                );
                continue;
            }
            println!(
                "{:<24} {:>6} {:>14.2} {:>18.2}",
                result.peer_endpoint, id, worker.duration_ms, worker.throughput_msg_per_sec
            );
            total_throughput += worker.throughput_msg_per_sec as f64;
            worker_count += 1;
        }
    }

    if worker_count > 0 {
        println!(
            "{:<24} {:>6} {:>14} {:>18.2}",
            "AVG".bold(),
            "",
            "",
            total_throughput / worker_count as f64
        );
    }
}

fn print_latency_table(results: &[ResultContainer]) {
    println!("{}", "Consumer latency (ms)".bold().underline());
    println!(
        "{:<24} {:>6} {:>8} {:>8} {:>8} {:>8} {:>8} {:>10} {:>10}",
        "peer", "worker", "min", "q1", "q2", "q3", "max", "mean", "std dev"
    );

    let mut any = false;
    for result in results {
        for (id, worker) in result.subscriber_results.iter().enumerate() {
            let Some(latency) = &worker.latency else { continue };
            any = true;
            println!(
                "{:<24} {:>6} {:>8} {:>8} {:>8} {:>8} {:>8} {:>10.2} {:>10.2}",
                result.peer_endpoint,
                id,
                latency.min,
                latency.q1,
                latency.q2,
                latency.q3,
                latency.max,
                latency.mean,
                latency.std_dev
            );
        }
    }

    if !any {
        println!("{}", "(no latency samples reported)".dimmed());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use flotilla_core::{LatencyStats, WorkerResult};

    fn container_with_one_of_each() -> ResultContainer {
        ResultContainer {
            peer_endpoint: "localhost:9500".into(),
            publisher_results: vec![WorkerResult::success(100.0, 1000.0, None)],
            subscriber_results: vec![WorkerResult::success(
                100.0,
                1000.0,
                Some(LatencyStats {
                    min: 1,
                    q1: 2,
                    q2: 3,
                    q3: 4,
                    max: 5,
                    mean: 3.0,
                    std_dev: 1.0,
                }),
            )],
        }
    }

    #[test]
    fn print_summary_does_not_panic_on_a_well_formed_result() {
        print_summary(&[container_with_one_of_each()]);
    }

    #[test]
    fn print_summary_does_not_panic_on_an_error_result() {
        let container = ResultContainer {
            peer_endpoint: "localhost:9500".into(),
            publisher_results: vec![WorkerResult::error("boom")],
            subscriber_results: vec![],
        };
        print_summary(&[container]);
    }

    #[test]
    fn print_summary_does_not_panic_on_an_empty_run() {
        print_summary(&[]);
    }
}
