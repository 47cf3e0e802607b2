//! End-to-end scheduler scenarios: concurrent submitters racing concurrent
//! agents, and parse-then-dispatch equivalence with direct evaluation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use calc_compute::{Dispatcher, ExpressionStatus};
use calc_core::config::OperationTimings;
use proptest::prelude::*;

/// Reference evaluator: split into additive terms, fold each term's `*` and
/// `/` left to right, then fold the terms left to right.
fn reference(tokens: &[Token]) -> f64 {
    let mut total: Option<f64> = None;
    let mut pending_sign = '+';
    let mut term: Option<f64> = None;
    let mut term_op = '*';

    for token in tokens {
        match *token {
            Token::Num(v) => {
                term = Some(match term {
                    None => v,
                    Some(t) if term_op == '*' => t * v,
                    Some(t) => t / v,
                });
            }
            Token::Op(op @ ('*' | '/')) => term_op = op,
            Token::Op(op) => {
                let t = term.take().unwrap();
                total = Some(match total {
                    None => t,
                    Some(acc) if pending_sign == '+' => acc + t,
                    Some(acc) => acc - t,
                });
                pending_sign = op;
                term_op = '*';
            }
        }
    }
    let t = term.unwrap();
    match total {
        None => t,
        Some(acc) if pending_sign == '+' => acc + t,
        Some(acc) => acc - t,
    }
}

#[derive(Debug, Clone, Copy)]
enum Token {
    Num(f64),
    Op(char),
}

fn render(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| match t {
            Token::Num(v) => v.to_string(),
            Token::Op(c) => c.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn expression_strategy() -> impl Strategy<Value = Vec<Token>> {
    let number = (1u32..1000, 0u32..4).prop_map(|(whole, frac)| f64::from(whole) + f64::from(frac) * 0.25);
    let op = prop_oneof![Just('+'), Just('-'), Just('*'), Just('/')];
    (number.clone(), proptest::collection::vec((op, number), 0..8)).prop_map(|(first, rest)| {
        let mut tokens = vec![Token::Num(first)];
        for (op, n) in rest {
            tokens.push(Token::Op(op));
            tokens.push(Token::Num(n));
        }
        tokens
    })
}

async fn run_to_completion(dispatcher: &Dispatcher, src: &str) -> f64 {
    let id = dispatcher.submit(src).await.unwrap();
    while let Some(task) = dispatcher.pull() {
        dispatcher.complete(task.result(task.evaluate())).unwrap();
    }
    let expr = dispatcher.registry().get(&id).unwrap();
    assert_eq!(expr.status(), ExpressionStatus::Completed);
    expr.result().unwrap()
}

proptest! {
    #[test]
    fn dispatch_matches_reference_evaluation(tokens in expression_strategy()) {
        let src = render(&tokens);
        let expected = reference(&tokens);
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let got = runtime.block_on(async {
            let dispatcher = Dispatcher::new(64, OperationTimings::uniform(0));
            run_to_completion(&dispatcher, &src).await
        });
        let tolerance = 1e-9 * expected.abs().max(1.0);
        prop_assert!((got - expected).abs() <= tolerance, "{src}: got {got}, expected {expected}");
    }
}

#[test]
fn reference_evaluator_sanity() {
    let tokens = [
        Token::Num(3.0),
        Token::Op('+'),
        Token::Num(4.0),
        Token::Op('*'),
        Token::Num(2.0),
    ];
    assert_eq!(reference(&tokens), 11.0);
    assert_eq!(
        reference(&[Token::Num(10.0), Token::Op('-'), Token::Num(2.0), Token::Op('-'), Token::Num(3.0)]),
        5.0
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_expressions_do_not_cross_contaminate() {
    let dispatcher = Arc::new(Dispatcher::new(16, OperationTimings::uniform(0)));
    let stop = Arc::new(AtomicBool::new(false));

    let agents: Vec<_> = (0..4)
        .map(|_| {
            let dispatcher = Arc::clone(&dispatcher);
            let stop = Arc::clone(&stop);
            tokio::spawn(async move {
                while !stop.load(Ordering::Relaxed) {
                    match dispatcher.pull() {
                        Some(task) => {
                            dispatcher.complete(task.result(task.evaluate())).unwrap();
                        }
                        None => tokio::task::yield_now().await,
                    }
                }
            })
        })
        .collect();

    let submitters: Vec<_> = (0..40u32)
        .map(|i| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                let src = format!("{i}*2+{i}*3-{i}/1+1");
                let id = dispatcher.submit(&src).await.unwrap();
                (id, f64::from(i) * 4.0 + 1.0)
            })
        })
        .collect();

    let mut expected = Vec::new();
    for handle in futures::future::join_all(submitters).await {
        expected.push(handle.unwrap());
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let done = expected.iter().all(|(id, _)| {
            dispatcher.registry().get(id).unwrap().status() == ExpressionStatus::Completed
        });
        if done {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "expressions did not finish");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    stop.store(true, Ordering::Relaxed);
    for agent in agents {
        agent.await.unwrap();
    }

    for (id, value) in &expected {
        assert_eq!(dispatcher.registry().get(id).unwrap().result(), Some(*value));
    }
    let metrics = dispatcher.metrics();
    assert_eq!(metrics.expressions_completed, 40);
    assert_eq!(metrics.tasks_dispatched, metrics.tasks_completed);
    assert_eq!(metrics.tasks_completed, 40 * 6);
    assert_eq!(metrics.completions_rejected, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pull_never_blocks_while_submitters_race() {
    let dispatcher = Arc::new(Dispatcher::new(256, OperationTimings::uniform(0)));

    let submitter = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            for i in 0..50 {
                dispatcher.submit(&format!("{i}+1")).await.unwrap();
            }
        })
    };

    let mut pulled = 0;
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    while pulled < 50 {
        let started = std::time::Instant::now();
        let task = dispatcher.pull();
        assert!(started.elapsed() < Duration::from_millis(100), "pull blocked");
        match task {
            Some(_) => pulled += 1,
            None => tokio::task::yield_now().await,
        }
        assert!(std::time::Instant::now() < deadline);
    }
    submitter.await.unwrap();
    assert!(dispatcher.pull().is_none());
}
