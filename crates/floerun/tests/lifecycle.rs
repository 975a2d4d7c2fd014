//! Communicator lifecycle, configuration and proxy identity.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context as _;
use anyhow::Result;
use floerpc::Context;
use floerpc::Identity;
use floerpc::OperationMode;

use floerun::Communicator;
use floerun::Error;
use floerun::Location;
use floerun::Loopback;
use floerun::Properties;
use floerun::communicator::State;
use floerun::endpoint::Endpoint;
use floerun::endpoint::Protocol;
use floerun::reference::EndpointSelection;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn communicator(props: &[(&str, &str)]) -> Result<(Communicator, Arc<Loopback>)> {
    init_tracing();
    let loopback = Arc::new(Loopback::ok(&[])?);
    let props: Properties = props.iter().copied().collect();
    let comm = Communicator::builder()
        .properties(props)
        .loopback(Arc::clone(&loopback))
        .build()?;
    Ok((comm, loopback))
}

// --- Destroy ---

#[test]
fn test_destroy_is_idempotent() -> Result<()> {
    let (comm, _) = communicator(&[])?;
    assert_eq!(comm.instance().state(), State::Active);

    assert!(comm.destroy());
    assert!(comm.is_destroyed());
    assert!(!comm.destroy());
    assert_eq!(comm.instance().state(), State::Destroyed);
    Ok(())
}

#[test]
fn test_concurrent_destroy_has_one_winner() -> Result<()> {
    let (comm, _) = communicator(&[])?;

    let winners: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let comm = comm.clone();
                scope.spawn(move || comm.destroy())
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().map(usize::from).unwrap_or(0))
            .sum()
    });
    assert_eq!(winners, 1);
    assert!(comm.is_destroyed());
    Ok(())
}

#[test]
fn test_accessors_fail_after_destroy() -> Result<()> {
    let (comm, loopback) = communicator(&[("Printer.Proxy", "printer:tcp -p 1")])?;
    let printer = comm.string_to_proxy("printer:tcp -p 1")?.context("null proxy")?;
    comm.destroy();

    assert_eq!(comm.string_to_proxy("printer"), Err(Error::CommunicatorDestroyed));
    assert_eq!(comm.proxy_to_string(Some(&printer)), Err(Error::CommunicatorDestroyed));
    assert_eq!(comm.property_to_proxy("Printer.Proxy"), Err(Error::CommunicatorDestroyed));
    assert!(matches!(
        comm.create_proxy(Identity::new("x", ""), Location::Indirect(String::new())),
        Err(Error::CommunicatorDestroyed)
    ));
    assert!(matches!(
        comm.instance().reference_factory(),
        Err(Error::CommunicatorDestroyed)
    ));
    assert_eq!(
        printer.invoke("print", OperationMode::Normal, &[], None),
        Err(Error::CommunicatorDestroyed)
    );
    assert_eq!(loopback.send_count(), 0);

    // Existing proxies remain usable as values.
    assert_eq!(printer.to_string(), "printer -t:tcp -h localhost -p 1");
    assert!(printer.with_secure(true).reference().secure());
    Ok(())
}

// --- Configuration ---

#[test]
fn test_invalid_property_fails_build() {
    init_tracing();
    let result = Communicator::builder()
        .property("Floe.RetryIntervals", "soon")
        .build();
    assert!(matches!(result, Err(Error::InvalidProperty { .. })));
}

#[test]
fn test_default_host_applies() -> Result<()> {
    let (comm, _) = communicator(&[("Floe.Default.Host", "example.com")])?;
    let printer = comm.string_to_proxy("printer:tcp -p 1")?.context("null proxy")?;
    assert_eq!(printer.reference().endpoints()[0].host, "example.com");
    comm.destroy();
    Ok(())
}

#[test]
fn test_default_locator_applies() -> Result<()> {
    let (comm, _) = communicator(&[("Floe.Default.Locator", "Grid/Locator:tcp -p 4061")])?;
    let printer = comm.string_to_proxy("printer @ PrinterAdapter")?.context("null proxy")?;

    let locator = printer.reference().locator().context("no locator")?;
    assert_eq!(locator.identity(), &Identity::new("Locator", "Grid"));
    comm.destroy();
    Ok(())
}

#[test]
fn test_property_to_proxy() -> Result<()> {
    let (comm, _) = communicator(&[
        ("Printer.Proxy", "printer:tcp -p 1:ssl -p 2"),
        ("Printer.Proxy.PreferSecure", "1"),
        ("Printer.Proxy.EndpointSelection", "Ordered"),
        ("Printer.Proxy.Unknown", "warns"),
    ])?;

    let printer = comm.property_to_proxy("Printer.Proxy")?.context("null proxy")?;
    assert!(printer.reference().prefer_secure());
    let hosts: Vec<Protocol> = printer
        .reference()
        .resolve_endpoints()
        .into_iter()
        .map(|e| e.protocol)
        .collect();
    assert_eq!(hosts, [Protocol::Ssl, Protocol::Tcp]);

    assert!(comm.property_to_proxy("Missing.Proxy")?.is_none());
    comm.destroy();
    Ok(())
}

#[test]
fn test_default_context_is_copied() -> Result<()> {
    let (comm, _) = communicator(&[])?;

    let mut context: Context = [("k".to_string(), "v".to_string())].into();
    comm.set_default_context(&context);
    context.insert("later".into(), "ignored".into());

    let mut copy = comm.default_context();
    assert_eq!(copy.len(), 1);
    copy.clear();
    assert_eq!(comm.default_context().len(), 1);

    comm.destroy();
    Ok(())
}

// --- Proxies ---

#[test]
fn test_equal_proxies_share_references() -> Result<()> {
    let (comm, _) = communicator(&[])?;
    let a = comm.string_to_proxy("printer -f fax:tcp -p 1")?.context("null proxy")?;
    let b = comm.string_to_proxy("printer -f fax:tcp -h localhost -p 1")?.context("null proxy")?;

    assert_eq!(a, b);
    assert!(a.reference().ptr_eq(b.reference()));

    let set: HashSet<_> = [a.clone(), b.clone(), a.with_facet("")].into_iter().collect();
    assert_eq!(set.len(), 2);

    let unchanged = a.with_secure(false);
    assert!(unchanged.reference().ptr_eq(a.reference()));
    let back = a.with_oneway().with_twoway();
    assert!(back.reference().ptr_eq(a.reference()));

    comm.destroy();
    Ok(())
}

#[test]
fn test_proxy_strings() -> Result<()> {
    let (comm, _) = communicator(&[])?;
    assert!(comm.string_to_proxy("")?.is_none());
    assert_eq!(comm.proxy_to_string(None)?, "");

    let printer = comm.string_to_proxy("printer -o @ \"My Adapter\"")?.context("null proxy")?;
    let text = comm.proxy_to_string(Some(&printer))?;
    assert_eq!(text, "printer -o @ \"My Adapter\"");
    assert_eq!(comm.string_to_proxy(&text)?, Some(printer));

    comm.destroy();
    Ok(())
}

#[test]
fn test_create_proxy() -> Result<()> {
    let (comm, _) = communicator(&[])?;
    let endpoint = Endpoint::new(Protocol::Tcp, "localhost", 1);
    let made = comm.create_proxy(Identity::new("printer", ""), Location::Direct(vec![endpoint]))?;
    let parsed = comm.string_to_proxy("printer:tcp -p 1")?.context("null proxy")?;
    assert_eq!(made, parsed);

    assert!(matches!(
        comm.create_proxy(Identity::new("", "cat"), Location::Indirect(String::new())),
        Err(Error::ProxyParse { .. })
    ));

    comm.destroy();
    Ok(())
}

#[test]
fn test_create_proxy_applies_configured_defaults() -> Result<()> {
    let (comm, _) = communicator(&[
        ("Floe.Default.EndpointSelection", "Ordered"),
        ("Floe.Default.PreferSecure", "1"),
    ])?;
    let endpoint = Endpoint::new(Protocol::Tcp, "localhost", 1);
    let made = comm.create_proxy(Identity::new("printer", ""), Location::Direct(vec![endpoint]))?;
    let parsed = comm.string_to_proxy("printer:tcp -p 1")?.context("null proxy")?;

    assert_eq!(made, parsed);
    assert_eq!(made.reference().endpoint_selection(), EndpointSelection::Ordered);
    assert!(made.reference().prefer_secure());

    comm.destroy();
    Ok(())
}

#[test]
fn test_dropped_proxies_leave_cache_bounded() -> Result<()> {
    let (comm, _) = communicator(&[])?;
    let base = comm.string_to_proxy("printer:tcp -p 1")?.context("null proxy")?;

    for i in 0..1000 {
        let context: Context = [("req".to_string(), i.to_string())].into();
        drop(base.with_context(context));
    }

    let entries = comm.instance().reference_factory()?.cache().len();
    assert!(entries <= 65, "cache holds {} entries", entries);

    let again = comm.string_to_proxy("printer:tcp -p 1")?.context("null proxy")?;
    assert!(again.reference().ptr_eq(base.reference()));

    comm.destroy();
    Ok(())
}

#[test]
fn test_identity_strings() -> Result<()> {
    let (comm, _) = communicator(&[])?;
    let identity = comm.string_to_identity("dev\\/ice/na me")?;
    assert_eq!(identity, Identity::new("na me", "dev/ice"));
    assert_eq!(comm.identity_to_string(&identity), "dev\\/ice/na me");
    assert!(comm.string_to_identity("a/b/c").is_err());

    comm.destroy();
    Ok(())
}

#[test]
fn test_proxy_communicator_shares_instance() -> Result<()> {
    let (comm, _) = communicator(&[])?;
    let printer = comm.string_to_proxy("printer")?.context("null proxy")?;
    assert!(Arc::ptr_eq(printer.communicator().instance(), comm.instance()));

    printer.communicator().destroy();
    assert!(comm.is_destroyed());
    Ok(())
}
