//! End-to-end tests: config document -> engine -> route table.

use std::io::Write;

use pretty_assertions::assert_eq;
use sonic_policy::{ConfigOp, PolicyDirection, RouteDisposition};
use sonic_policymgrd::{PolicyConfigEntry, PolicyMgr, PolicyMgrConfig};
use sonic_types::IpPrefix;
use tempfile::Builder;

const CONFIG: &str = r#"{
  "engine": { "name": "rib", "candidate_batch_size": 2 },
  "prefix_sets": [
    {
      "name": "private",
      "prefixes": [
        { "ip_prefix": "10.0.0.0/8", "masklength_range": "16..24" },
        { "ip_prefix": "192.168.0.0/16", "masklength_range": "16..32" }
      ]
    }
  ],
  "conditions": [
    { "name": "cond-private", "condition": { "dst_ip_prefix_match": { "prefix_set": "private" } } },
    { "name": "cond-bgp", "condition": { "protocol_match": { "protocol": "BGP" } } },
    { "name": "cond-static", "condition": { "protocol_match": { "protocol": "STATIC" } } }
  ],
  "actions": [
    { "name": "permit", "action": { "route_disposition": "permit" } },
    { "name": "deny", "action": { "route_disposition": "deny" } },
    { "name": "to-ospf", "action": { "redistribution": { "target_protocol": "OSPF" } } },
    { "name": "distance-5", "action": { "set_admin_distance": { "value": 5 } } }
  ],
  "statements": [
    {
      "name": "accept-private-bgp",
      "match_conditions": "all",
      "conditions": ["cond-private", "cond-bgp"],
      "actions": ["permit"]
    },
    {
      "name": "redistribute-static",
      "match_conditions": "any",
      "conditions": ["cond-static"],
      "actions": ["to-ospf", "distance-5"]
    }
  ],
  "policies": [
    {
      "name": "bgp-in",
      "precedence": 10,
      "import": true,
      "statements": [{ "precedence": 1, "statement": "accept-private-bgp" }],
      "extensions": { "bgp": { "local_preference": 150 } }
    },
    {
      "name": "static-out",
      "precedence": 10,
      "export": true,
      "statements": [{ "precedence": 1, "statement": "redistribute-static" }]
    }
  ],
  "routes": [
    { "prefix": "10.1.0.0/16", "protocol": "BGP", "admin_distance": 20 },
    { "prefix": "10.2.3.0/28", "protocol": "BGP", "admin_distance": 20 },
    { "prefix": "192.168.10.0/24", "protocol": "STATIC", "admin_distance": 1 },
    { "prefix": "172.16.0.0/12", "protocol": "BGP", "admin_distance": 20 }
  ]
}"#;

fn pfx(s: &str) -> IpPrefix {
    s.parse().unwrap()
}

fn load() -> PolicyMgrConfig {
    let mut file = Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, "{}", CONFIG).unwrap();
    file.flush().unwrap();
    PolicyMgrConfig::load(file.path()).unwrap()
}

#[test]
fn test_config_applies_policies_to_routes() {
    let config = load();
    let (mgr, report) = PolicyMgr::from_config(&config);
    assert!(report.is_clean(), "{:?}", report.failures);
    assert_eq!(report.succeeded, config.definition_count());

    let engine = mgr.engine();
    assert_eq!(engine.policy_at(PolicyDirection::Import, 10), Some("bgp-in"));
    assert_eq!(engine.policy_at(PolicyDirection::Export, 10), Some("static-out"));

    let accepted = mgr.routes().route(&pfx("10.1.0.0/16")).unwrap();
    assert_eq!(accepted.disposition, Some(RouteDisposition::Permit));
    assert_eq!(accepted.local_preference, Some(150));

    // outside the 16..24 mask range
    let too_long = mgr.routes().route(&pfx("10.2.3.0/28")).unwrap();
    assert_eq!(too_long.disposition, None);

    let public = mgr.routes().route(&pfx("172.16.0.0/12")).unwrap();
    assert_eq!(public.disposition, None);

    let static_route = mgr.routes().route(&pfx("192.168.10.0/24")).unwrap();
    assert_eq!(static_route.redistributed_to, vec!["OSPF"]);
    assert_eq!(static_route.admin_distance(), 5);
    assert_eq!(static_route.disposition, None);
}

#[test]
fn test_remove_config_withdraws_everything() {
    let config = load();
    let (mut mgr, _) = PolicyMgr::from_config(&config);

    let report = mgr.remove_config(&config);
    assert!(report.is_clean(), "{:?}", report.failures);

    for route in mgr.routes().snapshot() {
        assert_eq!(route.disposition, None);
        assert!(route.redistributed_to.is_empty());
        assert_eq!(route.local_preference, None);
        assert_eq!(route.admin_distance(), route.entry.admin_distance);
    }
    assert_eq!(mgr.engine().policy_count(), 0);
    assert_eq!(mgr.engine().statement_count(), 0);
    assert!(mgr.engine().prefix_set("private").is_none());
}

#[test]
fn test_in_use_delete_is_reported() {
    let config = load();
    let (mut mgr, _) = PolicyMgr::from_config(&config);

    let statement = PolicyConfigEntry::Statement(config.statements[0].clone());
    let err = mgr.process(ConfigOp::Delete, &statement).unwrap_err();
    assert!(err.to_string().contains("bgp-in"));

    let policy = PolicyConfigEntry::Policy(config.policies[0].clone());
    mgr.process(ConfigOp::Delete, &policy).unwrap();
    mgr.process(ConfigOp::Delete, &statement).unwrap();

    let accepted = mgr.routes().route(&pfx("10.1.0.0/16")).unwrap();
    assert_eq!(accepted.disposition, None);
}

#[test]
fn test_dump_after_apply() {
    let config = load();
    let (mgr, _) = PolicyMgr::from_config(&config);
    let dump = mgr.dump();

    assert_eq!(dump.statements, vec!["accept-private-bgp", "redistribute-static"]);
    assert_eq!(dump.policies, vec!["bgp-in", "static-out"]);
    assert_eq!(dump.import_policies, vec![(10, "bgp-in".to_string())]);
    assert_eq!(dump.routes.len(), 4);
}

const OVERLAP: &str = r#"{
  "conditions": [
    { "name": "cond-bgp", "condition": { "protocol_match": { "protocol": "BGP" } } },
    { "name": "cond-static", "condition": { "protocol_match": { "protocol": "STATIC" } } }
  ],
  "actions": [
    { "name": "permit", "action": { "route_disposition": "permit" } },
    { "name": "deny", "action": { "route_disposition": "deny" } }
  ],
  "statements": [
    { "name": "accept-bgp", "match_conditions": "any", "conditions": ["cond-bgp"], "actions": ["permit"] },
    { "name": "reject-static", "match_conditions": "any", "conditions": ["cond-static"], "actions": ["deny"] }
  ],
  "policies": [
    { "name": "p1", "precedence": 10, "import": true, "statements": [{ "precedence": 1, "statement": "accept-bgp" }] },
    { "name": "p2", "precedence": 20, "import": true, "statements": [{ "precedence": 1, "statement": "accept-bgp" }] },
    { "name": "static-deny", "precedence": 30, "import": true, "statements": [{ "precedence": 1, "statement": "reject-static" }] }
  ],
  "routes": [
    { "prefix": "10.1.2.0/24", "protocol": "BGP" },
    { "prefix": "10.1.2.0/24", "protocol": "STATIC" }
  ]
}"#;

#[test]
fn test_overlapping_policy_survives_withdraw() {
    let config = PolicyMgrConfig::from_json(OVERLAP).unwrap();
    let (mut mgr, report) = PolicyMgr::from_config(&config);
    assert!(report.is_clean(), "{:?}", report.failures);

    let p2 = PolicyConfigEntry::Policy(config.policies[1].clone());
    mgr.process(ConfigOp::Delete, &p2).unwrap();

    assert_eq!(mgr.engine().applied_effects("p1").len(), 1);
    let bgp = mgr.routes().route_from(&pfx("10.1.2.0/24"), "BGP").unwrap();
    assert_eq!(bgp.disposition, Some(RouteDisposition::Permit));

    let p1 = PolicyConfigEntry::Policy(config.policies[0].clone());
    mgr.process(ConfigOp::Delete, &p1).unwrap();
    let bgp = mgr.routes().route_from(&pfx("10.1.2.0/24"), "BGP").unwrap();
    assert_eq!(bgp.disposition, None);
}

#[test]
fn test_same_prefix_routes_are_separate_candidates() {
    let config = PolicyMgrConfig::from_json(OVERLAP).unwrap();
    let (mgr, _) = PolicyMgr::from_config(&config);

    let bgp = mgr.routes().route_from(&pfx("10.1.2.0/24"), "BGP").unwrap();
    let stat = mgr.routes().route_from(&pfx("10.1.2.0/24"), "STATIC").unwrap();
    assert_eq!(bgp.disposition, Some(RouteDisposition::Permit));
    assert_eq!(stat.disposition, Some(RouteDisposition::Deny));
    assert_eq!(stat.effects.len(), 1);
    assert_eq!(stat.effects[0].policy, "static-deny");
}
