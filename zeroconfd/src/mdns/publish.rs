use std::net::IpAddr;
use anyhow::{anyhow, Context, Result};
use hickory_proto::rr::rdata::{A, AAAA, PTR, SRV, TXT};
use hickory_proto::rr::{Name, RData, Record};
use shared::protocol::DEFAULT_TTL;
use shared::registry::ServiceTypeRegistry;
use shared::types::{Host, Service};
use crate::config::{HostConfig, ServiceConfig};
use crate::zone::{Entry, Zone};

/// Build the advertised host from config, falling back to the system hostname.
pub fn local_host(config: &HostConfig) -> Result<Host> {
    let name = match &config.name {
        Some(name) => name.clone(),
        None => {
            let hostname = hostname::get()
                .context("Failed to get system hostname")?
                .to_string_lossy()
                .to_string();
            // only the first label belongs to the host
            hostname.split('.').next().unwrap_or_default().to_string()
        }
    };

    if name.is_empty() {
        return Err(anyhow!("Host name is empty"));
    }
    if config.addresses.is_empty() {
        tracing::warn!("No addresses configured for {}; publishing without address records", name);
    }

    Ok(Host::new(name, config.domain.clone(), config.addresses.clone()))
}

/// Resolve configured services against the registry.
pub fn configured_services(
    host: &Host,
    services: &[ServiceConfig],
    registry: &ServiceTypeRegistry,
) -> Result<Vec<Service>> {
    services
        .iter()
        .map(|svc| -> Result<Service> {
            let service_type = registry
                .get(&svc.service_type)
                .with_context(|| format!("Unknown service type: {}", svc.service_type))?;
            Ok(Service::new(host.clone(), service_type.clone(), svc.port))
        })
        .collect()
}

fn parse_name(name: &str) -> Result<Name> {
    let mut parsed = Name::from_ascii(name).with_context(|| format!("Invalid DNS name: {}", name))?;
    // questions off the wire are always absolute
    parsed.set_fqdn(true);
    Ok(parsed)
}

/// The records advertising `service`: one address record per host address,
/// then PTR, SRV and TXT.
pub fn service_records(service: &Service) -> Result<Vec<Record>> {
    let host = parse_name(&service.fqdn())?;
    let service_type = parse_name(&service.service_type_name())?;
    let instance = parse_name(&service.instance_name())?;

    let mut records: Vec<Record> = service
        .host
        .addresses
        .iter()
        .map(|addr| {
            let rdata = match addr {
                IpAddr::V4(v4) => RData::A(A(*v4)),
                IpAddr::V6(v6) => RData::AAAA(AAAA(*v6)),
            };
            Record::from_rdata(host.clone(), DEFAULT_TTL, rdata)
        })
        .collect();

    records.push(Record::from_rdata(
        service_type,
        DEFAULT_TTL,
        RData::PTR(PTR(instance.clone())),
    ));
    records.push(Record::from_rdata(
        instance.clone(),
        DEFAULT_TTL,
        RData::SRV(SRV::new(0, 0, service.port, host)),
    ));
    // empty for now; key/value attributes go here
    records.push(Record::from_rdata(
        instance,
        DEFAULT_TTL,
        RData::TXT(TXT::new(vec![String::new()])),
    ));

    Ok(records)
}

/// Submit every record of `service` to the zone as publishable.
pub async fn publish<Z: Zone + ?Sized>(zone: &Z, service: &Service) -> Result<()> {
    for record in service_records(service)? {
        publish_record(zone, record).await?;
    }

    tracing::info!(
        "Published {} on port {}",
        service.instance_name(),
        service.port
    );
    Ok(())
}

pub async fn publish_record<Z: Zone + ?Sized>(zone: &Z, record: Record) -> Result<()> {
    zone.add(Entry::published(record))
        .await
        .context("Failed to submit record to zone")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use hickory_proto::rr::RecordType;
    use shared::types::ServiceType;
    use crate::zone::Question;
    use crate::zone_manager::ZoneHandle;

    fn name(s: &str) -> Name {
        Name::from_ascii(s).unwrap()
    }

    fn foo_ssh(addresses: Vec<IpAddr>) -> Service {
        Service::new(Host::new("foo", "local.", addresses), ServiceType::ssh(), 22)
    }

    #[test]
    fn test_record_counts_follow_addresses() {
        let service = foo_ssh(vec![
            IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1)),
        ]);
        let records = service_records(&service).unwrap();
        let count = |t: RecordType| records.iter().filter(|r| r.record_type() == t).count();

        assert_eq!(count(RecordType::A), 2);
        assert_eq!(count(RecordType::AAAA), 1);
        assert_eq!(count(RecordType::PTR), 1);
        assert_eq!(count(RecordType::SRV), 1);
        assert_eq!(count(RecordType::TXT), 1);
        assert!(records.iter().all(|r| r.ttl() == DEFAULT_TTL));
    }

    #[test]
    fn test_no_addresses_still_advertises_service() {
        let records = service_records(&foo_ssh(vec![])).unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_invalid_name_rejected() {
        let host = Host::new("x".repeat(64), "local.", vec![]);
        let service = Service::new(host, ServiceType::ssh(), 22);
        assert!(service_records(&service).is_err());
    }

    #[test]
    fn test_relative_domain_yields_absolute_names() {
        let service = Service::new(Host::new("foo", "local", vec![]), ServiceType::ssh(), 22);
        let records = service_records(&service).unwrap();
        assert!(records.iter().all(|r| r.name().is_fqdn()));
        assert_eq!(records[0].name(), &name("_ssh._tcp.local."));
    }

    #[test]
    fn test_configured_services() {
        let host = Host::new("foo", "local.", vec![]);
        let registry = ServiceTypeRegistry::default();
        let wanted = vec![ServiceConfig { service_type: "ssh".to_string(), port: 22 }];

        let services = configured_services(&host, &wanted, &registry).unwrap();
        assert_eq!(services[0].instance_name(), "foo._ssh._tcp.local.");

        let unknown = vec![ServiceConfig { service_type: "gopher".to_string(), port: 70 }];
        assert!(configured_services(&host, &unknown, &registry).is_err());
    }

    #[test]
    fn test_local_host_from_config() {
        let config = HostConfig {
            name: Some("foo".to_string()),
            domain: "local.".to_string(),
            addresses: vec![IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4))],
        };
        let host = local_host(&config).unwrap();
        assert_eq!(host.fqdn(), "foo.local.");
    }

    #[tokio::test]
    async fn test_publish_ssh_service() {
        let zone = ZoneHandle::spawn(16);
        let service = foo_ssh(vec![IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4))]);
        publish(&zone, &service).await.unwrap();

        let a = zone.query(Question::new(name("foo.local."), RecordType::A)).await.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].data(), &RData::A(A(Ipv4Addr::new(1, 2, 3, 4))));
        assert_eq!(a[0].record.ttl(), 3600);
        assert!(a[0].publish);

        let ptr = zone.query(Question::new(name("_ssh._tcp.local."), RecordType::PTR)).await.unwrap();
        assert_eq!(ptr.len(), 1);
        assert_eq!(ptr[0].data(), &RData::PTR(PTR(name("foo._ssh._tcp.local."))));

        let srv = zone.query(Question::new(name("foo._ssh._tcp.local."), RecordType::SRV)).await.unwrap();
        assert_eq!(srv.len(), 1);
        match srv[0].data() {
            RData::SRV(srv) => {
                assert_eq!(srv.port(), 22);
                assert_eq!(srv.target(), &name("foo.local."));
            }
            other => panic!("expected SRV, got {:?}", other),
        }

        let txt = zone.query(Question::new(name("foo._ssh._tcp.local."), RecordType::TXT)).await.unwrap();
        assert_eq!(txt.len(), 1);
        assert_eq!(txt[0].record.ttl(), 3600);

        let all = zone.query(Question::any_name(RecordType::ANY)).await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_publish_twice_is_idempotent() {
        let zone = ZoneHandle::spawn(16);
        let service = foo_ssh(vec![IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4))]);
        publish(&zone, &service).await.unwrap();
        publish(&zone, &service).await.unwrap();

        let all = zone.query(Question::any_name(RecordType::ANY)).await.unwrap();
        assert_eq!(all.len(), 4);
    }
}
