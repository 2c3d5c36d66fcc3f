//! PowerShell rendering for the DnsServer, DhcpServer, ActiveDirectory and
//! GroupPolicy cmdlets.
//!
//! A fetch script prints [`MISSING`] when the object does not exist, and
//! otherwise one JSON line `{"attrs":{..},"unknown":[..]}` keyed by the
//! attribute names of the kind's schema.  Mutation scripts print nothing and
//! fail by throwing.
use super::SurfaceError;
use crate::engine::{Operation, OperationKind};
use crate::model::{AttrMap, AttrValue, GpoKey, Identity, ObjectKind, TYPE_ATTR};
use crate::schema::{self, OptionSpec};

/// Printed by a fetch script when the object does not exist.
pub const MISSING: &str = "null";

const PREAMBLE: [&str; 3] = [
    "$ErrorActionPreference = 'Stop'",
    "$ProgressPreference = 'SilentlyContinue'",
    "function Out-State($attrs, $unknown) { [ordered]@{ attrs = $attrs; unknown = @($unknown) } | ConvertTo-Json -Compress -Depth 5 }",
];

/// OU attributes backed by named cmdlet parameters: (attribute, parameter, LDAP name).
const OU_FIELDS: &[(&str, &str, &str)] = &[
    ("description", "Description", "description"),
    ("display_name", "DisplayName", "displayName"),
    ("managed_by", "ManagedBy", "managedBy"),
    ("location.street_address", "StreetAddress", "street"),
    ("location.city", "City", "l"),
    ("location.state", "State", "st"),
    ("location.postal_code", "PostalCode", "postalCode"),
    ("location.country", "Country", "c"),
];

/// DHCP scope attributes stored as option values: (attribute, parameter, option id).
const SCOPE_OPTIONS: &[(&str, &str, u8)] = &[
    ("router", "Router", 3),
    ("dns_servers", "DnsServer", 6),
    ("dns_domain", "DnsDomain", 15),
];

/// Quote `text` as a PowerShell single-quoted literal.
#[must_use]
pub fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Render an attribute value as a PowerShell literal.
#[must_use]
pub fn literal(value: &AttrValue) -> String {
    match value {
        AttrValue::Bool(true) => "$true".to_string(),
        AttrValue::Bool(false) => "$false".to_string(),
        AttrValue::Int(i) => i.to_string(),
        AttrValue::Text(s) => quote(s),
        AttrValue::List(items) => {
            let quoted: Vec<String> = items.iter().map(|i| quote(i)).collect();
            format!("@({})", quoted.join(", "))
        }
    }
}

/// `all_settings_enabled` -> `AllSettingsEnabled`.
fn pascal(snake: &str) -> String {
    snake
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// One cmdlet invocation with named parameters.
#[derive(Debug)]
struct Cmdlet(String);

impl Cmdlet {
    fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    fn arg(mut self, name: &str, value: impl AsRef<str>) -> Self {
        self.0.push_str(" -");
        self.0.push_str(name);
        self.0.push(' ');
        self.0.push_str(value.as_ref());
        self
    }

    fn opt(self, name: &str, value: Option<&AttrValue>) -> Self {
        match value {
            Some(v) => self.arg(name, literal(v)),
            None => self,
        }
    }

    fn raw(mut self, text: &str) -> Self {
        if !text.is_empty() {
            self.0.push(' ');
            self.0.push_str(text);
        }
        self
    }

    fn build(self) -> String {
        self.0
    }
}

/// Lines of one script, starting with the shared preamble.
#[derive(Debug)]
struct Script(Vec<String>);

impl Script {
    fn new() -> Self {
        Self(PREAMBLE.iter().map(ToString::to_string).collect())
    }

    fn line(&mut self, text: impl Into<String>) -> &mut Self {
        self.0.push(text.into());
        self
    }

    fn finish(self) -> String {
        self.0.join("\n")
    }
}

/// Attributes of a modify with resets folded in.
///
/// Resets whose option documents a default are set to that default; the
/// rest come back as names to clear.
fn fold_resets(op: &Operation) -> (AttrMap, Vec<String>) {
    let schema = schema::for_kind(op.identity.kind());
    let mut attrs = op.target_attrs.clone();
    let mut cleared = Vec::new();
    for name in &op.reset_attrs {
        match schema.option(name).and_then(OptionSpec::default_value) {
            Some(value) => {
                attrs.insert(name.clone(), value);
            }
            None => cleared.push(name.clone()),
        }
    }
    (attrs, cleared)
}

fn unsupported(operation: impl Into<String>, identity: &Identity) -> SurfaceError {
    SurfaceError::UnsupportedOperation {
        operation: operation.into(),
        resource: identity.to_string(),
    }
}

fn rejected(identity: &Identity, reason: impl Into<String>) -> SurfaceError {
    SurfaceError::Rejected {
        resource: identity.to_string(),
        reason: reason.into(),
    }
}

/// `-State` argument for the scope's `active` flag.
fn scope_state(attrs: &AttrMap) -> Option<&'static str> {
    attrs
        .get("active")
        .and_then(AttrValue::as_bool)
        .map(|active| if active { "'Active'" } else { "'InActive'" })
}

/// Renders fetch and mutation scripts against one host.
#[derive(Debug, Clone, Copy, Default)]
pub struct Renderer<'a> {
    server: Option<&'a str>,
}

impl<'a> Renderer<'a> {
    /// Target `server`, or the local machine when `None`.
    #[must_use]
    pub const fn new(server: Option<&'a str>) -> Self {
        Self { server }
    }

    /// `-ComputerName` for the DnsServer and DhcpServer modules.
    fn computer(&self) -> String {
        self.server
            .map(|s| format!("-ComputerName {}", quote(s)))
            .unwrap_or_default()
    }

    /// `-Server` for the ActiveDirectory and GroupPolicy modules.
    fn server(&self) -> String {
        self.server
            .map(|s| format!("-Server {}", quote(s)))
            .unwrap_or_default()
    }

    /// Script that reads the live state of `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::UnsupportedOperation`] for packages, which are
    /// not managed through PowerShell.
    pub fn fetch(&self, identity: &Identity) -> Result<String, SurfaceError> {
        match identity {
            Identity::DnsZone { name } => Ok(self.zone_fetch(name)),
            Identity::DhcpScope { scope_id } => Ok(self.scope_fetch(&scope_id.to_string())),
            Identity::DhcpLease { ip, .. } => Ok(self.lease_fetch(&ip.to_string())),
            Identity::Ou { path, name } => Ok(self.ou_fetch(path, name)),
            Identity::Gpo { key } => Ok(self.gpo_fetch(key)),
            Identity::Package { .. } => Err(unsupported("fetch", identity)),
        }
    }

    /// Script that performs `op`.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::UnsupportedOperation`] for a recreate marker,
    /// for packages, and for changes the cmdlets cannot make in place;
    /// [`SurfaceError::Rejected`] when the operation lacks an attribute the
    /// cmdlet needs.
    pub fn execute(&self, op: &Operation) -> Result<String, SurfaceError> {
        match &op.identity {
            Identity::DnsZone { name } => self.zone_execute(name, op),
            Identity::DhcpScope { scope_id } => self.scope_execute(&scope_id.to_string(), op),
            Identity::DhcpLease { scope_id, ip } => {
                self.lease_execute(&scope_id.to_string(), &ip.to_string(), op)
            }
            Identity::Ou { path, name } => self.ou_execute(path, name, op),
            Identity::Gpo { key } => self.gpo_execute(key, op),
            Identity::Package { .. } => Err(unsupported(op.kind.to_string(), &op.identity)),
        }
    }

    // ------------------------------------------------------------------
    // DNS zones
    // ------------------------------------------------------------------

    fn zone_fetch(&self, name: &str) -> String {
        let mut s = Script::new();
        s.line(
            Cmdlet::new("$z = Get-DnsServerZone")
                .arg("Name", quote(name))
                .arg("ErrorAction", "SilentlyContinue")
                .raw(&self.computer())
                .build(),
        )
        .line(format!("if (-not $z) {{ '{MISSING}'; return }}"))
        .line("$a = [ordered]@{}")
        .line("$a.type = \"$($z.ZoneType)\".ToLower()")
        .line("if ($z.IsDsIntegrated) { $a.replication = \"$($z.ReplicationScope)\".ToLower() } else { $a.replication = 'none' }")
        .line("if ($a.type -eq 'primary') { $a.dynamic_update = \"$($z.DynamicUpdate)\".ToLower() }")
        .line("else { $a.dns_servers = @($z.MasterServers | ForEach-Object { \"$_\" }) }")
        .line("Out-State $a @()");
        s.finish()
    }

    fn zone_execute(&self, name: &str, op: &Operation) -> Result<String, SurfaceError> {
        let mut s = Script::new();
        match op.kind {
            OperationKind::Create => self.zone_create(&mut s, name, op)?,
            OperationKind::Modify => self.zone_modify(&mut s, name, op)?,
            OperationKind::Delete => {
                s.line(
                    Cmdlet::new("Remove-DnsServerZone")
                        .arg("Name", quote(name))
                        .raw("-Force")
                        .raw(&self.computer())
                        .build(),
                );
            }
            OperationKind::Recreate => return Err(unsupported(op.kind.to_string(), &op.identity)),
        }
        Ok(s.finish())
    }

    fn zone_create(&self, s: &mut Script, name: &str, op: &Operation) -> Result<(), SurfaceError> {
        let n = quote(name);
        let zone_file = quote(&format!("{name}.dns"));
        let attrs = &op.target_attrs;
        let zone_type = attrs
            .get(TYPE_ATTR)
            .and_then(AttrValue::as_text)
            .unwrap_or("primary");
        let replication = attrs.get("replication");
        let file_backed = replication.and_then(AttrValue::as_text) == Some("none");
        let storage = |c: Cmdlet| {
            if file_backed {
                c.arg("ZoneFile", &zone_file)
            } else {
                c.opt("ReplicationScope", replication)
            }
        };
        let masters = attrs.get("dns_servers");
        let cmd = match zone_type {
            "primary" => {
                let c = storage(Cmdlet::new("Add-DnsServerPrimaryZone").arg("Name", &n));
                let c = if file_backed || replication.is_some() {
                    c
                } else {
                    c.arg("ReplicationScope", "'Forest'")
                };
                c.opt("DynamicUpdate", attrs.get("dynamic_update"))
            }
            "secondary" => Cmdlet::new("Add-DnsServerSecondaryZone")
                .arg("Name", &n)
                .arg("ZoneFile", &zone_file)
                .opt("MasterServers", masters),
            "stub" => {
                let c = Cmdlet::new("Add-DnsServerStubZone")
                    .arg("Name", &n)
                    .opt("MasterServers", masters);
                if replication.is_none() {
                    c.arg("ZoneFile", &zone_file)
                } else {
                    storage(c)
                }
            }
            "forwarder" => {
                let c = Cmdlet::new("Add-DnsServerConditionalForwarderZone")
                    .arg("Name", &n)
                    .opt("MasterServers", masters);
                if file_backed { c } else { storage(c) }
            }
            other => return Err(unsupported(format!("create {other} zone"), &op.identity)),
        };
        s.line(cmd.raw(&self.computer()).build());
        Ok(())
    }

    fn zone_modify(&self, s: &mut Script, name: &str, op: &Operation) -> Result<(), SurfaceError> {
        let n = quote(name);
        let zone_file = quote(&format!("{name}.dns"));
        let (mut attrs, cleared) = fold_resets(op);
        if let Some(first) = cleared.first() {
            return Err(unsupported(format!("reset of {first}"), &op.identity));
        }
        let to_type = attrs.remove(TYPE_ATTR);
        match to_type.as_ref().and_then(AttrValue::as_text) {
            None => {}
            Some("secondary") => {
                let masters = attrs.remove("dns_servers").ok_or_else(|| {
                    rejected(&op.identity, "dns_servers is required to convert to secondary")
                })?;
                s.line(
                    Cmdlet::new("ConvertTo-DnsServerSecondaryZone")
                        .arg("Name", &n)
                        .arg("MasterServers", literal(&masters))
                        .arg("ZoneFile", &zone_file)
                        .raw("-Force")
                        .raw(&self.computer())
                        .build(),
                );
            }
            Some("primary") => {
                attrs.remove("dns_servers");
                let convert = || {
                    Cmdlet::new("ConvertTo-DnsServerPrimaryZone").arg("Name", &n).raw("-Force")
                };
                match attrs.remove("replication") {
                    Some(AttrValue::Text(r)) if r == "none" => s.line(
                        convert().arg("ZoneFile", &zone_file).raw(&self.computer()).build(),
                    ),
                    Some(scope) => s.line(
                        convert()
                            .arg("ReplicationScope", literal(&scope))
                            .raw(&self.computer())
                            .build(),
                    ),
                    None => s
                        .line(
                            Cmdlet::new("$z = Get-DnsServerZone")
                                .arg("Name", &n)
                                .raw(&self.computer())
                                .build(),
                        )
                        .line(format!(
                            "if ($z.IsDsIntegrated) {{ {} }} else {{ {} }}",
                            convert()
                                .arg("ReplicationScope", "$z.ReplicationScope")
                                .raw(&self.computer())
                                .build(),
                            convert().arg("ZoneFile", &zone_file).raw(&self.computer()).build(),
                        )),
                };
            }
            Some(other) => {
                return Err(unsupported(format!("convert to {other} in place"), &op.identity));
            }
        }
        if !attrs.is_empty() {
            self.zone_settings(s, &n, &zone_file, &attrs);
        }
        Ok(())
    }

    /// Non-type zone settings, dispatched on the zone type found at run time.
    fn zone_settings(&self, s: &mut Script, n: &str, zone_file: &str, attrs: &AttrMap) {
        let replication = attrs.get("replication");
        let to_file = replication.and_then(AttrValue::as_text) == Some("none");
        let masters = attrs.get("dns_servers");

        let mut primary = Vec::new();
        if masters.is_some() {
            primary.push("throw 'dns_servers cannot be set on a primary zone'".to_string());
        }
        if to_file {
            primary.push(
                Cmdlet::new("ConvertTo-DnsServerPrimaryZone")
                    .arg("Name", n)
                    .arg("ZoneFile", zone_file)
                    .raw("-Force")
                    .raw(&self.computer())
                    .build(),
            );
        }
        let scope = if to_file { None } else { replication };
        if scope.is_some() || attrs.contains_key("dynamic_update") {
            primary.push(
                Cmdlet::new("Set-DnsServerPrimaryZone")
                    .arg("Name", n)
                    .opt("ReplicationScope", scope)
                    .opt("DynamicUpdate", attrs.get("dynamic_update"))
                    .raw(&self.computer())
                    .build(),
            );
        }

        let others = |cmdlet: &str, with_scope: bool| {
            let mut body = Vec::new();
            if attrs.contains_key("dynamic_update") {
                body.push("throw 'dynamic_update applies to primary zones only'".to_string());
            }
            if to_file || (!with_scope && replication.is_some()) {
                body.push("throw 'replication cannot be changed on this zone type'".to_string());
            }
            let scope = if with_scope { scope } else { None };
            if masters.is_some() || scope.is_some() {
                body.push(
                    Cmdlet::new(cmdlet)
                        .arg("Name", n)
                        .opt("MasterServers", masters)
                        .opt("ReplicationScope", scope)
                        .raw(&self.computer())
                        .build(),
                );
            }
            body
        };

        s.line(Cmdlet::new("$z = Get-DnsServerZone").arg("Name", n).raw(&self.computer()).build())
            .line("switch (\"$($z.ZoneType)\") {");
        for (zone_type, body) in [
            ("Primary", primary),
            ("Secondary", others("Set-DnsServerSecondaryZone", false)),
            ("Stub", others("Set-DnsServerStubZone", true)),
            ("Forwarder", others("Set-DnsServerConditionalForwarderZone", true)),
        ] {
            if !body.is_empty() {
                s.line(format!("  '{zone_type}' {{ {} }}", body.join("; ")));
            }
        }
        s.line("}");
    }

    // ------------------------------------------------------------------
    // DHCP scopes
    // ------------------------------------------------------------------

    fn scope_fetch(&self, scope_id: &str) -> String {
        let id = quote(scope_id);
        let mut s = Script::new();
        s.line(
            Cmdlet::new("$s = Get-DhcpServerv4Scope")
                .arg("ScopeId", &id)
                .arg("ErrorAction", "SilentlyContinue")
                .raw(&self.computer())
                .build(),
        )
        .line(format!("if (-not $s) {{ '{MISSING}'; return }}"))
        .line("$a = [ordered]@{}")
        .line("$a.name = \"$($s.Name)\"")
        .line("$a.description = \"$($s.Description)\"")
        .line("$a.start_range = \"$($s.StartRange)\"")
        .line("$a.end_range = \"$($s.EndRange)\"")
        .line("$a.subnet_mask = \"$($s.SubnetMask)\"")
        .line("$a.active = \"$($s.State)\" -eq 'Active'")
        .line(r"$a.lease_duration = $s.LeaseDuration.ToString('d\.hh\:mm\:ss')")
        .line(format!(
            "$o = @({})",
            Cmdlet::new("Get-DhcpServerv4OptionValue")
                .arg("ScopeId", &id)
                .arg("ErrorAction", "SilentlyContinue")
                .raw(&self.computer())
                .build()
        ));
        for (attr, _, option_id) in SCOPE_OPTIONS {
            let value = if *attr == "dns_domain" { "\"$($v.Value[0])\"" } else { "@($v.Value)" };
            s.line(format!("$v = $o | Where-Object {{ $_.OptionId -eq {option_id} }}"))
                .line(format!("if ($v) {{ $a.{attr} = {value} }}"));
        }
        s.line("Out-State $a @()");
        s.finish()
    }

    fn scope_options(&self, id: &str, attrs: &AttrMap) -> Option<String> {
        SCOPE_OPTIONS
            .iter()
            .any(|(attr, _, _)| attrs.contains_key(*attr))
            .then(|| {
                SCOPE_OPTIONS
                    .iter()
                    .fold(
                        Cmdlet::new("Set-DhcpServerv4OptionValue").arg("ScopeId", id),
                        |c, (attr, param, _)| c.opt(param, attrs.get(*attr)),
                    )
                    .raw("-Force")
                    .raw(&self.computer())
                    .build()
            })
    }

    fn scope_execute(&self, scope_id: &str, op: &Operation) -> Result<String, SurfaceError> {
        let id = quote(scope_id);
        let mut s = Script::new();
        match op.kind {
            OperationKind::Create => self.scope_create(&mut s, &id, op)?,
            OperationKind::Modify => self.scope_modify(&mut s, &id, op)?,
            OperationKind::Delete => {
                s.line(
                    Cmdlet::new("Remove-DhcpServerv4Scope")
                        .arg("ScopeId", &id)
                        .raw("-Force")
                        .raw(&self.computer())
                        .build(),
                );
            }
            OperationKind::Recreate => return Err(unsupported(op.kind.to_string(), &op.identity)),
        }
        Ok(s.finish())
    }

    fn scope_create(&self, s: &mut Script, id: &str, op: &Operation) -> Result<(), SurfaceError> {
        let attrs = &op.target_attrs;
        for required in ["name", "start_range", "end_range", "subnet_mask"] {
            if !attrs.contains_key(required) {
                return Err(rejected(&op.identity, format!("{required} is required to create a scope")));
            }
        }
        let mut add = Cmdlet::new("Add-DhcpServerv4Scope")
            .opt("Name", attrs.get("name"))
            .opt("StartRange", attrs.get("start_range"))
            .opt("EndRange", attrs.get("end_range"))
            .opt("SubnetMask", attrs.get("subnet_mask"))
            .opt("Description", attrs.get("description"))
            .opt("LeaseDuration", attrs.get("lease_duration"));
        if let Some(state) = scope_state(attrs) {
            add = add.arg("State", state);
        }
        s.line(add.raw(&self.computer()).build());
        if let Some(options) = self.scope_options(id, attrs) {
            s.line(options);
        }
        Ok(())
    }

    fn scope_modify(&self, s: &mut Script, id: &str, op: &Operation) -> Result<(), SurfaceError> {
        let (attrs, cleared) = fold_resets(op);
        if attrs.contains_key("subnet_mask") {
            return Err(unsupported("change subnet_mask in place", &op.identity));
        }
        let mut set = Cmdlet::new("Set-DhcpServerv4Scope")
            .arg("ScopeId", id)
            .opt("Name", attrs.get("name"))
            .opt("Description", attrs.get("description"))
            .opt("StartRange", attrs.get("start_range"))
            .opt("EndRange", attrs.get("end_range"))
            .opt("LeaseDuration", attrs.get("lease_duration"));
        if let Some(state) = scope_state(&attrs) {
            set = set.arg("State", state);
        }
        if ["name", "description", "start_range", "end_range", "lease_duration", "active"]
            .iter()
            .any(|a| attrs.contains_key(*a))
        {
            s.line(set.raw(&self.computer()).build());
        }
        if let Some(options) = self.scope_options(id, &attrs) {
            s.line(options);
        }
        let mut option_ids = Vec::new();
        for name in &cleared {
            match SCOPE_OPTIONS.iter().find(|(attr, _, _)| *attr == name.as_str()) {
                Some((_, _, option_id)) => option_ids.push(option_id.to_string()),
                None => return Err(unsupported(format!("reset of {name}"), &op.identity)),
            }
        }
        if !option_ids.is_empty() {
            s.line(
                Cmdlet::new("Remove-DhcpServerv4OptionValue")
                    .arg("ScopeId", id)
                    .arg("OptionId", option_ids.join(","))
                    .raw(&self.computer())
                    .build(),
            );
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // DHCP leases and reservations
    // ------------------------------------------------------------------

    fn lease_fetch(&self, ip: &str) -> String {
        let ip = quote(ip);
        let get = |cmdlet: &str| {
            Cmdlet::new(cmdlet)
                .arg("IPAddress", &ip)
                .arg("ErrorAction", "SilentlyContinue")
                .raw(&self.computer())
                .build()
        };
        let mut s = Script::new();
        s.line(format!("$r = {}", get("Get-DhcpServerv4Reservation")))
            .line(format!("$l = {}", get("Get-DhcpServerv4Lease")))
            .line(format!("if (-not $r -and -not $l) {{ '{MISSING}'; return }}"))
            .line("$a = [ordered]@{}")
            .line("if ($r) { $a.type = 'reservation'; $src = $r; $a.hostname = \"$($r.Name)\" }")
            .line("else { $a.type = 'lease'; $src = $l; $a.hostname = \"$($l.HostName)\" }")
            .line("$a.client_id = \"$($src.ClientId)\".ToLower()")
            .line("$a.description = \"$($src.Description)\"")
            .line("Out-State $a @()");
        s.finish()
    }

    fn lease_execute(&self, scope_id: &str, ip: &str, op: &Operation) -> Result<String, SurfaceError> {
        let (scope_id, ip) = (quote(scope_id), quote(ip));
        let mut s = Script::new();
        match op.kind {
            OperationKind::Create => self.lease_create(&mut s, &scope_id, &ip, op)?,
            OperationKind::Modify => self.lease_modify(&mut s, &scope_id, &ip, op)?,
            OperationKind::Delete => {
                for cmdlet in ["Remove-DhcpServerv4Reservation", "Remove-DhcpServerv4Lease"] {
                    s.line(
                        Cmdlet::new(cmdlet)
                            .arg("IPAddress", &ip)
                            .arg("ErrorAction", "SilentlyContinue")
                            .raw(&self.computer())
                            .build(),
                    );
                }
            }
            OperationKind::Recreate => return Err(unsupported(op.kind.to_string(), &op.identity)),
        }
        Ok(s.finish())
    }

    fn lease_create(
        &self,
        s: &mut Script,
        scope_id: &str,
        ip: &str,
        op: &Operation,
    ) -> Result<(), SurfaceError> {
        let attrs = &op.target_attrs;
        if !attrs.contains_key("client_id") {
            return Err(rejected(&op.identity, "client_id is required to create a lease"));
        }
        let reservation = attrs.get(TYPE_ATTR).and_then(AttrValue::as_text) == Some("reservation");
        let (cmdlet, host_param) = if reservation {
            ("Add-DhcpServerv4Reservation", "Name")
        } else {
            ("Add-DhcpServerv4Lease", "HostName")
        };
        s.line(
            Cmdlet::new(cmdlet)
                .arg("ScopeId", scope_id)
                .arg("IPAddress", ip)
                .opt("ClientId", attrs.get("client_id"))
                .opt(host_param, attrs.get("hostname"))
                .opt("Description", attrs.get("description"))
                .raw(&self.computer())
                .build(),
        );
        Ok(())
    }

    /// Type conversion first, then the remaining attributes.  Leases have no
    /// setter, so a lease is removed and added back with the new values.
    fn lease_modify(
        &self,
        s: &mut Script,
        scope_id: &str,
        ip: &str,
        op: &Operation,
    ) -> Result<(), SurfaceError> {
        let (mut attrs, cleared) = fold_resets(op);
        for name in cleared {
            attrs.insert(name, AttrValue::Text(String::new()));
        }
        let on_ip = |cmdlet: &str| {
            Cmdlet::new(cmdlet).arg("IPAddress", ip).raw(&self.computer()).build()
        };
        match attrs.remove(TYPE_ATTR).as_ref().and_then(AttrValue::as_text) {
            None => {}
            Some("reservation") => {
                s.line(format!(
                    "{} | {}",
                    on_ip("Get-DhcpServerv4Lease"),
                    Cmdlet::new("Add-DhcpServerv4Reservation").raw(&self.computer()).build()
                ));
            }
            Some("lease") => {
                s.line(format!("$r = {}", on_ip("Get-DhcpServerv4Reservation")))
                    .line(on_ip("Remove-DhcpServerv4Reservation"))
                    .line(format!(
                        "if (-not ({} -ErrorAction SilentlyContinue)) {{ {} }}",
                        on_ip("Get-DhcpServerv4Lease"),
                        Cmdlet::new("Add-DhcpServerv4Lease")
                            .arg("ScopeId", scope_id)
                            .arg("IPAddress", ip)
                            .arg("ClientId", "$r.ClientId")
                            .arg("HostName", "\"$($r.Name)\"")
                            .arg("Description", "\"$($r.Description)\"")
                            .raw(&self.computer())
                            .build()
                    ));
            }
            Some(other) => {
                return Err(unsupported(format!("convert to {other}"), &op.identity));
            }
        }
        if !attrs.is_empty() {
            let keep = |attr: &str, fallback: &str| {
                attrs.get(attr).map_or_else(|| fallback.to_string(), literal)
            };
            s.line(format!(
                "if ({} -ErrorAction SilentlyContinue) {{",
                on_ip("Get-DhcpServerv4Reservation")
            ))
            .line(format!(
                "  {}",
                Cmdlet::new("Set-DhcpServerv4Reservation")
                    .arg("IPAddress", ip)
                    .opt("ClientId", attrs.get("client_id"))
                    .opt("Name", attrs.get("hostname"))
                    .opt("Description", attrs.get("description"))
                    .raw(&self.computer())
                    .build()
            ))
            .line("} else {")
            .line(format!("  $l = {}", on_ip("Get-DhcpServerv4Lease")))
            .line(format!("  {}", on_ip("Remove-DhcpServerv4Lease")))
            .line(format!(
                "  {}",
                Cmdlet::new("Add-DhcpServerv4Lease")
                    .arg("ScopeId", scope_id)
                    .arg("IPAddress", ip)
                    .arg("ClientId", keep("client_id", "$l.ClientId"))
                    .arg("HostName", keep("hostname", "\"$($l.HostName)\""))
                    .arg("Description", keep("description", "\"$($l.Description)\""))
                    .raw(&self.computer())
                    .build()
            ))
            .line("}");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Organizational units
    // ------------------------------------------------------------------

    /// Import the module and bind `$path` and `$dn`.
    fn ou_prelude(&self, s: &mut Script, path: &str, name: &str) {
        s.line("Import-Module ActiveDirectory");
        if path.trim().is_empty() {
            s.line(format!(
                "$path = ({}).DistinguishedName",
                Cmdlet::new("Get-ADDomain").raw(&self.server()).build()
            ));
        } else {
            s.line(format!("$path = {}", quote(path)));
        }
        s.line(format!("$dn = {} + $path", quote(&format!("OU={name},"))));
    }

    fn ou_fetch(&self, path: &str, name: &str) -> String {
        let mut s = Script::new();
        self.ou_prelude(&mut s, path, name);
        s.line(format!(
            "try {{ {} }} catch [Microsoft.ActiveDirectory.Management.ADIdentityNotFoundException] {{ '{MISSING}'; return }}",
            Cmdlet::new("$ou = Get-ADOrganizationalUnit")
                .arg("Identity", "$dn")
                .arg("Properties", "*")
                .raw(&self.server())
                .build()
        ))
        .line("$a = [ordered]@{}");
        for (attr, param, _) in OU_FIELDS {
            s.line(format!("$a['{attr}'] = \"$($ou.{param})\""));
        }
        s.line("$a.protected = [bool]$ou.ProtectedFromAccidentalDeletion")
            .line("foreach ($p in $ou.PropertyNames) {")
            .line("  $v = $ou.$p; $k = \"attributes.$($p.ToLower())\"")
            .line("  if ($v -is [string] -or $v -is [int] -or $v -is [long]) { $a[$k] = $v }")
            .line("  elseif ($v -is [System.Collections.ICollection] -and $v.Count -gt 0 -and @($v)[0] -is [string]) { $a[$k] = @($v) }")
            .line("}")
            .line("Out-State $a @()");
        s.finish()
    }

    fn ou_execute(&self, path: &str, name: &str, op: &Operation) -> Result<String, SurfaceError> {
        let named = |c: Cmdlet, attrs: &AttrMap| {
            OU_FIELDS
                .iter()
                .fold(c, |c, (attr, param, _)| c.opt(param, attrs.get(*attr)))
                .opt("ProtectedFromAccidentalDeletion", attrs.get("protected"))
        };
        let ldap_table = |attrs: &AttrMap| {
            let entries: Vec<String> = attrs
                .iter()
                .filter_map(|(k, v)| {
                    k.strip_prefix(schema::ou::ATTRIBUTE_PREFIX)
                        .map(|ldap| format!("{} = {}", quote(ldap), literal(v)))
                })
                .collect();
            (!entries.is_empty()).then(|| format!("@{{{}}}", entries.join("; ")))
        };

        let mut s = Script::new();
        self.ou_prelude(&mut s, path, name);
        match op.kind {
            OperationKind::Create => {
                let attrs = &op.target_attrs;
                let mut c = named(
                    Cmdlet::new("New-ADOrganizationalUnit").arg("Name", quote(name)).arg("Path", "$path"),
                    attrs,
                );
                if let Some(table) = ldap_table(attrs) {
                    c = c.arg("OtherAttributes", table);
                }
                s.line(c.raw(&self.server()).build());
            }
            OperationKind::Modify => {
                let (attrs, cleared) = fold_resets(op);
                let mut c = named(Cmdlet::new("Set-ADOrganizationalUnit").arg("Identity", "$dn"), &attrs);
                if let Some(table) = ldap_table(&attrs) {
                    c = c.arg("Replace", table);
                }
                let clear: Vec<String> = cleared
                    .iter()
                    .filter_map(|name| {
                        OU_FIELDS
                            .iter()
                            .find(|(attr, _, _)| *attr == name.as_str())
                            .map(|(_, _, ldap)| (*ldap).to_string())
                            .or_else(|| {
                                name.strip_prefix(schema::ou::ATTRIBUTE_PREFIX).map(ToString::to_string)
                            })
                    })
                    .map(|ldap| quote(&ldap))
                    .collect();
                if !clear.is_empty() {
                    c = c.arg("Clear", clear.join(","));
                }
                s.line(c.raw(&self.server()).build());
            }
            OperationKind::Delete => {
                s.line(
                    Cmdlet::new("Set-ADOrganizationalUnit")
                        .arg("Identity", "$dn")
                        .arg("ProtectedFromAccidentalDeletion", "$false")
                        .raw(&self.server())
                        .build(),
                )
                .line(
                    Cmdlet::new("Remove-ADOrganizationalUnit")
                        .arg("Identity", "$dn")
                        .raw("-Recursive -Confirm:$false")
                        .raw(&self.server())
                        .build(),
                );
            }
            OperationKind::Recreate => return Err(unsupported(op.kind.to_string(), &op.identity)),
        }
        Ok(s.finish())
    }

    // ------------------------------------------------------------------
    // Group Policy objects
    // ------------------------------------------------------------------

    fn gpo_select(cmdlet: &str, key: &GpoKey) -> Cmdlet {
        match key {
            GpoKey::Guid(guid) => Cmdlet::new(cmdlet).arg("Guid", quote(guid)),
            GpoKey::Name { name, domain } => Cmdlet::new(cmdlet)
                .arg("Name", quote(name))
                .arg("Domain", quote(domain)),
        }
    }

    fn gpo(&self, cmdlet: &str, key: &GpoKey) -> String {
        Self::gpo_select(cmdlet, key).raw(&self.server()).build()
    }

    fn gpo_fetch(&self, key: &GpoKey) -> String {
        let mut s = Script::new();
        s.line("Import-Module GroupPolicy")
            .line(format!(
                "try {{ $g = {} }} catch [System.ArgumentException] {{ '{MISSING}'; return }}",
                self.gpo("Get-GPO", key)
            ))
            .line("$a = [ordered]@{}");
        if matches!(key, GpoKey::Guid(_)) {
            s.line("$a.display_name = \"$($g.DisplayName)\"");
        }
        s.line("$a.comment = \"$($g.Description)\"")
            .line("$a.status = (\"$($g.GpoStatus)\" -creplace '(?<!^)([A-Z])', '_$1').ToLower()")
            .line("Out-State $a @()");
        s.finish()
    }

    fn gpo_properties(s: &mut Script, attrs: &AttrMap) {
        if let Some(v) = attrs.get("display_name") {
            s.line(format!("$g.DisplayName = {}", literal(v)));
        }
        if let Some(v) = attrs.get("comment") {
            s.line(format!("$g.Description = {}", literal(v)));
        }
        if let Some(status) = attrs.get("status").and_then(AttrValue::as_text) {
            s.line(format!("$g.GpoStatus = {}", quote(&pascal(status))));
        }
    }

    fn gpo_execute(&self, key: &GpoKey, op: &Operation) -> Result<String, SurfaceError> {
        let mut s = Script::new();
        s.line("Import-Module GroupPolicy");
        match (op.kind, key) {
            (OperationKind::Create, GpoKey::Guid(_)) => {
                return Err(rejected(&op.identity, "a GPO addressed by GUID cannot be created"));
            }
            (OperationKind::Create, GpoKey::Name { .. }) => {
                let mut attrs = op.target_attrs.clone();
                let comment = attrs.remove("comment");
                s.line(format!(
                    "$g = {}",
                    Self::gpo_select("New-GPO", key)
                        .opt("Comment", comment.as_ref())
                        .raw(&self.server())
                        .build()
                ));
                Self::gpo_properties(&mut s, &attrs);
            }
            (OperationKind::Modify, _) => {
                let (attrs, cleared) = fold_resets(op);
                if let Some(first) = cleared.first() {
                    return Err(unsupported(format!("reset of {first}"), &op.identity));
                }
                s.line(format!("$g = {}", self.gpo("Get-GPO", key)));
                Self::gpo_properties(&mut s, &attrs);
            }
            (OperationKind::Delete, _) => {
                s.line(self.gpo("Remove-GPO", key));
            }
            (OperationKind::Recreate, _) => return Err(unsupported(op.kind.to_string(), &op.identity)),
        }
        Ok(s.finish())
    }
}

/// Kinds rendered by this module.
#[must_use]
pub const fn renders(kind: ObjectKind) -> bool {
    !matches!(kind, ObjectKind::Package)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::engine::SideEffect;

    fn op(kind: OperationKind, identity: Identity, attrs: &[(&str, AttrValue)]) -> Operation {
        Operation {
            kind,
            identity,
            target_attrs: attrs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect(),
            reset_attrs: BTreeSet::new(),
            ordering_rank: 0,
            side_effect: SideEffect::None,
        }
    }

    fn zone() -> Identity {
        Identity::DnsZone {
            name: "corp.example.com".to_string(),
        }
    }

    fn scope() -> Identity {
        Identity::DhcpScope {
            scope_id: "10.0.0.0".parse().unwrap(),
        }
    }

    fn lease() -> Identity {
        Identity::DhcpLease {
            scope_id: "10.0.0.0".parse().unwrap(),
            ip: "10.0.0.50".parse().unwrap(),
        }
    }

    fn ou() -> Identity {
        Identity::Ou {
            path: "DC=corp,DC=example,DC=com".to_string(),
            name: "Servers".to_string(),
        }
    }

    fn gpo_by_name() -> Identity {
        Identity::Gpo {
            key: GpoKey::Name {
                name: "Baseline".to_string(),
                domain: "corp.example.com".to_string(),
            },
        }
    }

    // ------------------------------------------------------------------
    // Literals
    // ------------------------------------------------------------------

    #[test]
    fn quote_doubles_single_quotes() {
        assert_eq!(quote("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn literal_renders_each_value_kind() {
        assert_eq!(literal(&AttrValue::Bool(false)), "$false");
        assert_eq!(literal(&AttrValue::Int(42)), "42");
        assert_eq!(
            literal(&AttrValue::list(["10.0.0.1", "10.0.0.2"])),
            "@('10.0.0.1', '10.0.0.2')"
        );
    }

    #[test]
    fn pascal_joins_snake_case_words() {
        assert_eq!(pascal("user_settings_disabled"), "UserSettingsDisabled");
    }

    // ------------------------------------------------------------------
    // Fetch
    // ------------------------------------------------------------------

    #[test]
    fn fetch_targets_remote_server() {
        let r = Renderer::new(Some("dc01"));
        let script = r.fetch(&zone()).unwrap();
        assert!(script.contains("Get-DnsServerZone -Name 'corp.example.com'"));
        assert!(script.contains("-ComputerName 'dc01'"));
        assert!(script.starts_with("$ErrorActionPreference = 'Stop'"));
        assert!(script.contains("'null'; return"));
    }

    #[test]
    fn ad_cmdlets_use_server_parameter() {
        let script = Renderer::new(Some("dc01")).fetch(&ou()).unwrap();
        assert!(script.contains("-Server 'dc01'"));
        assert!(!script.contains("-ComputerName"));
        assert!(script.contains("$dn = 'OU=Servers,' + $path"));
    }

    #[test]
    fn ou_at_domain_root_resolves_path() {
        let id = Identity::Ou {
            path: String::new(),
            name: "Servers".to_string(),
        };
        let script = Renderer::default().fetch(&id).unwrap();
        assert!(script.contains("$path = (Get-ADDomain).DistinguishedName"));
    }

    #[test]
    fn scope_fetch_reads_options() {
        let script = Renderer::default().fetch(&scope()).unwrap();
        assert!(script.contains("Get-DhcpServerv4OptionValue -ScopeId '10.0.0.0'"));
        assert!(script.contains("$_.OptionId -eq 6"));
        assert!(script.contains("$a.dns_servers"));
    }

    #[test]
    fn package_is_not_rendered() {
        let id = Identity::Package {
            id: "Git.Git".to_string(),
        };
        assert!(!renders(id.kind()));
        assert!(matches!(
            Renderer::default().fetch(&id),
            Err(SurfaceError::UnsupportedOperation { .. })
        ));
    }

    // ------------------------------------------------------------------
    // DNS zones
    // ------------------------------------------------------------------

    #[test]
    fn file_backed_primary_uses_zone_file() {
        let script = Renderer::default()
            .execute(&op(
                OperationKind::Create,
                zone(),
                &[
                    ("type", AttrValue::from("primary")),
                    ("replication", AttrValue::from("none")),
                ],
            ))
            .unwrap();
        assert!(script.contains("Add-DnsServerPrimaryZone -Name 'corp.example.com' -ZoneFile 'corp.example.com.dns'"));
        assert!(!script.contains("ReplicationScope"));
    }

    #[test]
    fn primary_defaults_to_forest_replication() {
        let script = Renderer::default()
            .execute(&op(OperationKind::Create, zone(), &[("type", AttrValue::from("primary"))]))
            .unwrap();
        assert!(script.contains("-ReplicationScope 'Forest'"));
    }

    #[test]
    fn primary_to_secondary_converts_in_place() {
        let script = Renderer::default()
            .execute(&op(
                OperationKind::Modify,
                zone(),
                &[
                    ("type", AttrValue::from("secondary")),
                    ("dns_servers", AttrValue::list(["10.0.0.1"])),
                ],
            ))
            .unwrap();
        assert!(script.contains(
            "ConvertTo-DnsServerSecondaryZone -Name 'corp.example.com' -MasterServers @('10.0.0.1')"
        ));
        assert!(!script.contains("switch"));
    }

    #[test]
    fn secondary_conversion_requires_masters() {
        let err = Renderer::default()
            .execute(&op(OperationKind::Modify, zone(), &[("type", AttrValue::from("secondary"))]))
            .unwrap_err();
        assert!(matches!(err, SurfaceError::Rejected { .. }));
    }

    #[test]
    fn settings_dispatch_on_live_zone_type() {
        let script = Renderer::default()
            .execute(&op(
                OperationKind::Modify,
                zone(),
                &[("dynamic_update", AttrValue::from("none"))],
            ))
            .unwrap();
        assert!(script.contains("switch (\"$($z.ZoneType)\")"));
        assert!(script.contains("'Primary' { Set-DnsServerPrimaryZone -Name 'corp.example.com' -DynamicUpdate 'none' }"));
        assert!(script.contains("'Secondary' { throw"));
    }

    #[test]
    fn reset_uses_documented_default() {
        let mut modify = op(OperationKind::Modify, zone(), &[]);
        modify.reset_attrs.insert("dynamic_update".to_string());
        let script = Renderer::default().execute(&modify).unwrap();
        assert!(script.contains("-DynamicUpdate 'secure'"));
    }

    #[test]
    fn reset_without_default_is_unsupported_for_zones() {
        let mut modify = op(OperationKind::Modify, zone(), &[]);
        modify.reset_attrs.insert("dns_servers".to_string());
        assert!(matches!(
            Renderer::default().execute(&modify),
            Err(SurfaceError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn recreate_marker_is_never_rendered() {
        let err = Renderer::default()
            .execute(&op(OperationKind::Recreate, zone(), &[]))
            .unwrap_err();
        assert!(err.to_string().contains("recreate"));
    }

    // ------------------------------------------------------------------
    // DHCP
    // ------------------------------------------------------------------

    #[test]
    fn scope_create_sets_state_and_options() {
        let script = Renderer::default()
            .execute(&op(
                OperationKind::Create,
                scope(),
                &[
                    ("name", AttrValue::from("LAN")),
                    ("start_range", AttrValue::from("10.0.0.10")),
                    ("end_range", AttrValue::from("10.0.0.200")),
                    ("subnet_mask", AttrValue::from("255.255.255.0")),
                    ("active", AttrValue::Bool(false)),
                    ("router", AttrValue::list(["10.0.0.1"])),
                ],
            ))
            .unwrap();
        assert!(script.contains("Add-DhcpServerv4Scope -Name 'LAN'"));
        assert!(script.contains("-State 'InActive'"));
        assert!(script.contains("Set-DhcpServerv4OptionValue -ScopeId '10.0.0.0' -Router @('10.0.0.1') -Force"));
    }

    #[test]
    fn scope_create_requires_range() {
        let err = Renderer::default()
            .execute(&op(OperationKind::Create, scope(), &[("name", AttrValue::from("LAN"))]))
            .unwrap_err();
        assert!(err.to_string().contains("start_range"));
    }

    #[test]
    fn scope_option_reset_removes_option_value() {
        let mut modify = op(OperationKind::Modify, scope(), &[]);
        modify.reset_attrs.insert("router".to_string());
        modify.reset_attrs.insert("dns_domain".to_string());
        let script = Renderer::default().execute(&modify).unwrap();
        assert!(script.contains("Remove-DhcpServerv4OptionValue -ScopeId '10.0.0.0' -OptionId 15,3"));
        assert!(!script.contains("Set-DhcpServerv4Scope"));
    }

    #[test]
    fn reservation_create_uses_name_parameter() {
        let script = Renderer::default()
            .execute(&op(
                OperationKind::Create,
                lease(),
                &[
                    ("type", AttrValue::from("reservation")),
                    ("client_id", AttrValue::from("00-a1-b2-c3-d4-e5")),
                    ("hostname", AttrValue::from("printer")),
                ],
            ))
            .unwrap();
        assert!(script.contains("Add-DhcpServerv4Reservation -ScopeId '10.0.0.0' -IPAddress '10.0.0.50'"));
        assert!(script.contains("-Name 'printer'"));
    }

    #[test]
    fn lease_to_reservation_pipes_the_lease() {
        let script = Renderer::default()
            .execute(&op(OperationKind::Modify, lease(), &[("type", AttrValue::from("reservation"))]))
            .unwrap();
        assert!(script.contains(
            "Get-DhcpServerv4Lease -IPAddress '10.0.0.50' | Add-DhcpServerv4Reservation"
        ));
        assert!(!script.contains("Set-DhcpServerv4Reservation"));
    }

    // ------------------------------------------------------------------
    // Active Directory and Group Policy
    // ------------------------------------------------------------------

    #[test]
    fn ou_delete_clears_protection_first() {
        let script = Renderer::default()
            .execute(&op(OperationKind::Delete, ou(), &[]))
            .unwrap();
        let unprotect = script.find("-ProtectedFromAccidentalDeletion $false").unwrap();
        let remove = script.find("Remove-ADOrganizationalUnit").unwrap();
        assert!(unprotect < remove);
    }

    #[test]
    fn ou_modify_replaces_and_clears_ldap_attributes() {
        let mut modify = op(
            OperationKind::Modify,
            ou(),
            &[
                ("description", AttrValue::from("Member servers")),
                ("attributes.url", AttrValue::list(["https://a"])),
            ],
        );
        modify.reset_attrs.insert("location.city".to_string());
        modify.reset_attrs.insert("attributes.wwwhomepage".to_string());
        let script = Renderer::default().execute(&modify).unwrap();
        assert!(script.contains("-Description 'Member servers'"));
        assert!(script.contains("-Replace @{'url' = @('https://a')}"));
        assert!(script.contains("-Clear 'wwwhomepage','l'"));
    }

    #[test]
    fn gpo_create_sets_comment_and_status() {
        let script = Renderer::default()
            .execute(&op(
                OperationKind::Create,
                gpo_by_name(),
                &[
                    ("comment", AttrValue::from("baseline")),
                    ("status", AttrValue::from("user_settings_disabled")),
                ],
            ))
            .unwrap();
        assert!(script.contains("$g = New-GPO -Name 'Baseline' -Domain 'corp.example.com' -Comment 'baseline'"));
        assert!(script.contains("$g.GpoStatus = 'UserSettingsDisabled'"));
    }

    #[test]
    fn gpo_by_guid_cannot_be_created() {
        let id = Identity::Gpo {
            key: GpoKey::Guid("31b2f340-016d-11d2-945f-00c04fb984f9".to_string()),
        };
        assert!(matches!(
            Renderer::default().execute(&op(OperationKind::Create, id, &[])),
            Err(SurfaceError::Rejected { .. })
        ));
    }
}
