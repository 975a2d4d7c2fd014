//! Non-blocking invocations: callbacks, cancellation, retries and timeouts.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Context as _;
use anyhow::Result;
use floerpc::OperationMode;
use floerpc::OutputStream;
use floerpc::ReplyFrame;

use floerun::AsyncCall;
use floerun::Callbacks;
use floerun::Communicator;
use floerun::Error;
use floerun::Loopback;
use floerun::Phase;
use floerun::InvocationMode;
use floerun::Proxy;
use floerun::transport::AsyncTransport;
use floerun::transport::Route;
use floerun::transport::TransportError;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn communicator(loopback: &Arc<Loopback>, props: &[(&str, &str)]) -> Result<Communicator> {
    init_tracing();
    let mut builder = Communicator::builder().loopback(Arc::clone(loopback));
    for (key, value) in props {
        builder = builder.property(*key, *value);
    }
    Ok(builder.build()?)
}

fn proxy(communicator: &Communicator, s: &str) -> Result<Proxy> {
    communicator.string_to_proxy(s)?.context("null proxy")
}

/// Counts which callback ran.
#[derive(Clone, Default)]
struct Outcomes {
    succeeded: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
}

impl Outcomes {
    fn callbacks(&self) -> Callbacks {
        let succeeded = Arc::clone(&self.succeeded);
        let failed = Arc::clone(&self.failed);
        Callbacks::new(
            move |_| {
                succeeded.fetch_add(1, Ordering::SeqCst);
            },
            move |_| {
                failed.fetch_add(1, Ordering::SeqCst);
            },
        )
    }

    fn counts(&self) -> (usize, usize) {
        (
            self.succeeded.load(Ordering::SeqCst),
            self.failed.load(Ordering::SeqCst),
        )
    }
}

async fn wait_for(call: &AsyncCall, phase: Phase) {
    for _ in 0..500 {
        if call.phase() == phase {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("call never reached {:?}, stuck in {:?}", phase, call.phase());
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

// --- Completion ---

#[tokio::test]
async fn test_invoke_async_success() -> Result<()> {
    let loopback = Arc::new(Loopback::ok(&[7])?);
    let comm = communicator(&loopback, &[])?;
    let printer = proxy(&comm, "printer:tcp -p 10000")?;

    let reply = printer.invoke_async("status", OperationMode::Normal, &[], None).await?;
    assert!(reply.is_ok());
    assert_eq!(reply.body()?, vec![7]);
    assert_eq!(loopback.send_count(), 1);

    comm.destroy();
    Ok(())
}

#[tokio::test]
async fn test_async_pseudo_operations() -> Result<()> {
    let loopback = Arc::new(Loopback::serve(|request| {
        let mut out = OutputStream::new();
        match request.operation.as_str() {
            "ice_isA" => out.write_bool(true)?,
            "ice_ids" => out.write_string_seq(&["::Ice::Object"])?,
            "ice_id" => out.write_string("::Ice::Object")?,
            _ => {}
        }
        ReplyFrame::ok(&out.to_bytes()?)
    }));
    let comm = communicator(&loopback, &[])?;
    let printer = proxy(&comm, "printer:tcp -p 10000")?;

    assert!(printer.is_a_async("::Ice::Object", None).await?);
    printer.ping_async(None).await?;
    assert_eq!(printer.ids_async(None).await?, vec!["::Ice::Object"]);
    assert_eq!(printer.id_async(None).await?, "::Ice::Object");
    assert_eq!(
        printer.with_oneway().id_async(None).await,
        Err(Error::TwowayOnly("ice_id".into()))
    );

    comm.destroy();
    Ok(())
}

#[tokio::test]
async fn test_frames_match_blocking_engine() -> Result<()> {
    let loopback = Arc::new(Loopback::ok(&[])?);
    let comm = communicator(&loopback, &[])?;
    let printer = proxy(&comm, "dev/printer -f fax:tcp -h a -p 1:tcp -h b -p 2")?;

    printer.invoke("print", OperationMode::Idempotent, &[1, 2, 3], None)?;
    printer
        .invoke_async("print", OperationMode::Idempotent, &[1, 2, 3], None)
        .await?;

    let frames = loopback.frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0], frames[1]);

    comm.destroy();
    Ok(())
}

#[tokio::test]
async fn test_callbacks_run_once() -> Result<()> {
    let loopback = Arc::new(Loopback::ok(&[])?);
    let comm = communicator(&loopback, &[])?;
    let printer = proxy(&comm, "printer:tcp -p 10000")?;

    let outcomes = Outcomes::default();
    let call = printer.begin_invoke("print", OperationMode::Normal, &[], None, outcomes.callbacks())?;
    wait_for(&call, Phase::Succeeded).await;

    assert_eq!(outcomes.counts(), (1, 0));
    assert!(!call.cancel());
    assert_eq!(outcomes.counts(), (1, 0));
    assert_eq!(call.attempts(), 1);

    comm.destroy();
    Ok(())
}

#[tokio::test]
async fn test_oneway_skips_awaiting_reply() -> Result<()> {
    let loopback = Arc::new(Loopback::new(|_| Ok(Vec::new())));
    let comm = communicator(&loopback, &[])?;
    let printer = proxy(&comm, "printer -o:tcp -p 10000")?;

    // Held replies would block a twoway call; a oneway call never waits for one.
    loopback.hold();
    let reply = printer.invoke_async("print", OperationMode::Normal, &[], None).await?;
    assert!(reply.is_ok());
    assert_eq!(loopback.release(), 0);

    let datagram = proxy(&comm, "printer -d:udp -p 10000")?;
    datagram.invoke_async("print", OperationMode::Normal, &[], None).await?;
    assert_eq!(loopback.send_count(), 2);

    comm.destroy();
    Ok(())
}

// --- Cancellation ---

#[tokio::test]
async fn test_cancel_after_send_fires_once() -> Result<()> {
    let loopback = Arc::new(Loopback::ok(&[])?);
    let comm = communicator(&loopback, &[])?;
    let printer = proxy(&comm, "printer:tcp -p 10000")?;

    loopback.hold();
    let outcomes = Outcomes::default();
    let call = printer.begin_invoke("print", OperationMode::Normal, &[], None, outcomes.callbacks())?;
    wait_for(&call, Phase::AwaitingReply).await;

    assert!(call.cancel());
    assert_eq!(outcomes.counts(), (0, 1));
    assert_eq!(loopback.abandoned_count(), 1);

    // The late reply is decoded and dropped.
    assert_eq!(loopback.release(), 1);
    settle().await;
    assert_eq!(outcomes.counts(), (0, 1));
    assert_eq!(call.phase(), Phase::Failed);
    assert!(!call.cancel());
    assert_eq!(loopback.send_count(), 1);

    comm.destroy();
    Ok(())
}

#[tokio::test]
async fn test_cancel_reports_canceled() -> Result<()> {
    let loopback = Arc::new(Loopback::ok(&[])?);
    let comm = communicator(&loopback, &[])?;
    let printer = proxy(&comm, "printer:tcp -p 10000")?;

    loopback.hold();
    let (tx, rx) = tokio::sync::oneshot::channel();
    let call = printer.begin_invoke(
        "print",
        OperationMode::Normal,
        &[],
        None,
        Callbacks::from_fn(move |result| {
            let _ = tx.send(result);
        }),
    )?;
    wait_for(&call, Phase::AwaitingReply).await;
    call.cancel();

    assert_eq!(rx.await?, Err(Error::InvocationCanceled));
    loopback.release();

    comm.destroy();
    Ok(())
}

#[tokio::test]
async fn test_dropping_future_cancels() -> Result<()> {
    let loopback = Arc::new(Loopback::ok(&[])?);
    let comm = communicator(&loopback, &[])?;
    let printer = proxy(&comm, "printer:tcp -p 10000")?;

    loopback.hold();
    let pending = printer.invoke_async("print", OperationMode::Normal, &[], None);
    assert!(tokio::time::timeout(Duration::from_millis(20), pending).await.is_err());
    assert_eq!(loopback.abandoned_count(), 1);

    loopback.release();
    comm.destroy();
    Ok(())
}

#[tokio::test]
async fn test_abandon_before_receive_frees_reply_slot() -> Result<()> {
    init_tracing();
    let loopback = Loopback::ok(&[])?;
    let route = Route {
        endpoints: Vec::new(),
        adapter_id: Some(String::new()),
        timeout: None,
        secure: false,
        compress: false,
        mode: InvocationMode::Twoway,
    };

    loopback.hold();
    let ticket = AsyncTransport::send(&loopback, &route, vec![1, 2, 3], true).await?;
    assert_eq!(loopback.pending_count(), 1);

    loopback.abandon(ticket);
    assert_eq!(loopback.pending_count(), 0);
    assert_eq!(loopback.abandoned_count(), 1);
    assert!(matches!(
        AsyncTransport::receive(&loopback, ticket).await,
        Err(TransportError::ConnectionLost(_))
    ));

    // The held reply has nobody left to deliver to.
    assert_eq!(loopback.release(), 1);
    assert_eq!(loopback.pending_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_settled_calls_leave_no_pending_replies() -> Result<()> {
    let loopback = Arc::new(Loopback::ok(&[])?);
    let comm = communicator(&loopback, &[])?;
    let printer = proxy(&comm, "printer:tcp -p 10000")?;

    printer.invoke_async("print", OperationMode::Normal, &[], None).await?;

    loopback.hold();
    let call = printer.begin_invoke(
        "print",
        OperationMode::Normal,
        &[],
        None,
        Callbacks::from_fn(|_| {}),
    )?;
    wait_for(&call, Phase::AwaitingReply).await;
    call.cancel();
    loopback.release();
    settle().await;

    assert_eq!(loopback.pending_count(), 0);
    comm.destroy();
    Ok(())
}

// --- Retry & Timeouts ---

#[tokio::test]
async fn test_async_retry_bound() -> Result<()> {
    let loopback = Arc::new(Loopback::new(|_| {
        Err(TransportError::ConnectFailed("refused".into()))
    }));
    let comm = communicator(&loopback, &[("Floe.RetryIntervals", "0 5")])?;
    let printer = proxy(&comm, "printer:tcp -p 10000")?;

    let outcomes = Outcomes::default();
    let call = printer.begin_invoke("print", OperationMode::Normal, &[], None, outcomes.callbacks())?;
    wait_for(&call, Phase::Failed).await;

    assert_eq!(outcomes.counts(), (0, 1));
    assert_eq!(call.attempts(), 3);
    assert_eq!(loopback.send_count(), 3);

    comm.destroy();
    Ok(())
}

#[tokio::test]
async fn test_reply_failure_is_not_retried_for_normal_mode() -> Result<()> {
    let loopback = Arc::new(Loopback::new(|_| {
        Err(TransportError::ConnectionLost("reset".into()))
    }));
    let comm = communicator(&loopback, &[("Floe.RetryIntervals", "0 0")])?;
    let printer = proxy(&comm, "printer:tcp -p 10000")?;

    let err = printer
        .invoke_async("print", OperationMode::Normal, &[], None)
        .await
        .unwrap_err();
    assert_eq!(err, Error::Transport(TransportError::ConnectionLost("reset".into())));
    assert_eq!(loopback.send_count(), 1);

    printer
        .invoke_async("status", OperationMode::Idempotent, &[], None)
        .await
        .unwrap_err();
    assert_eq!(loopback.send_count(), 4);

    comm.destroy();
    Ok(())
}

#[tokio::test]
async fn test_timeout_is_retried_then_surfaced() -> Result<()> {
    let loopback = Arc::new(Loopback::ok(&[])?);
    let comm = communicator(&loopback, &[])?;
    let printer = proxy(&comm, "printer:tcp -p 10000")?.with_timeout(Some(Duration::from_millis(20)));

    loopback.hold();
    let err = printer
        .invoke_async("print", OperationMode::Normal, &[], None)
        .await
        .unwrap_err();
    assert_eq!(err, Error::Transport(TransportError::Timeout));
    assert_eq!(loopback.send_count(), 2);
    assert_eq!(loopback.abandoned_count(), 2);

    loopback.release();
    comm.destroy();
    Ok(())
}

// --- Misuse & Isolation ---

#[tokio::test]
async fn test_misuse_fails_before_callbacks() -> Result<()> {
    let loopback = Arc::new(Loopback::ok(&[])?);
    let comm = communicator(&loopback, &[])?;
    let printer = proxy(&comm, "printer:tcp -p 10000")?;

    let outcomes = Outcomes::default();
    let err = printer
        .with_batch_oneway()
        .begin_invoke("print", OperationMode::Normal, &[], None, outcomes.callbacks())
        .unwrap_err();
    assert!(matches!(err, Error::FeatureNotSupported(_)));
    settle().await;
    assert_eq!(outcomes.counts(), (0, 0));
    assert_eq!(loopback.send_count(), 0);

    comm.destroy();
    Ok(())
}

#[tokio::test]
async fn test_missing_async_transport() -> Result<()> {
    init_tracing();
    let loopback = Arc::new(Loopback::ok(&[])?);
    let comm = Communicator::builder().transport(loopback).build()?;
    let printer = proxy(&comm, "printer:tcp -p 10000")?;

    assert!(matches!(
        printer.invoke_async("print", OperationMode::Normal, &[], None).await,
        Err(Error::FeatureNotSupported(_))
    ));
    printer.invoke("print", OperationMode::Normal, &[], None)?;

    comm.destroy();
    Ok(())
}

#[tokio::test]
async fn test_panicking_callback_is_contained() -> Result<()> {
    let loopback = Arc::new(Loopback::ok(&[])?);
    let comm = communicator(&loopback, &[])?;
    let printer = proxy(&comm, "printer:tcp -p 10000")?;

    let call = printer.begin_invoke(
        "print",
        OperationMode::Normal,
        &[],
        None,
        Callbacks::new(|_| panic!("callback failure"), |_| {}),
    )?;
    wait_for(&call, Phase::Succeeded).await;

    // The runtime and transport keep working.
    printer.invoke_async("print", OperationMode::Normal, &[], None).await?;
    assert_eq!(loopback.send_count(), 2);

    comm.destroy();
    Ok(())
}

#[tokio::test]
async fn test_destroyed_communicator_rejects_calls() -> Result<()> {
    let loopback = Arc::new(Loopback::ok(&[])?);
    let comm = communicator(&loopback, &[])?;
    let printer = proxy(&comm, "printer:tcp -p 10000")?;

    comm.destroy();
    assert_eq!(
        printer.invoke_async("print", OperationMode::Normal, &[], None).await,
        Err(Error::CommunicatorDestroyed)
    );
    Ok(())
}
