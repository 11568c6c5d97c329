//! Static description of the tables a purge touches.
//!
//! Every table name and key column used in generated SQL comes from here,
//! never from user input. The same registry drives the startup schema check.

/// Owning table of a purge.
pub const INSTANCES: TableDescriptor = TableDescriptor {
    table: "instances",
    key_column: "uuid",
};

/// Identifier-mapping table; keyed on `uuid`, not `instance_uuid`.
pub const INSTANCE_ID_MAPPINGS: TableDescriptor = TableDescriptor {
    table: "instance_id_mappings",
    key_column: "uuid",
};

/// Event rows, keyed by the owning action's numeric id.
pub const INSTANCE_ACTIONS_EVENTS: TableDescriptor = TableDescriptor {
    table: "instance_actions_events",
    key_column: "action_id",
};

/// A table name and the column its purge statement matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDescriptor {
    pub table: &'static str,
    pub key_column: &'static str,
}

/// Tables holding rows keyed directly by `instance_uuid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependentTable {
    InstanceActions,
    InstanceFaults,
    InstanceInfoCaches,
    InstanceMetadata,
    InstanceSystemMetadata,
    Migrations,
    VirtualInterfaces,
    BlockDeviceMapping,
    SecurityGroupInstanceAssociation,
}

/// Deletion order for direct dependents. Runs after action events and
/// before the id mapping and the instance row.
pub const DEPENDENT_TABLES: &[DependentTable] = &[
    DependentTable::InstanceActions,
    DependentTable::InstanceFaults,
    DependentTable::InstanceInfoCaches,
    DependentTable::InstanceMetadata,
    DependentTable::InstanceSystemMetadata,
    DependentTable::Migrations,
    DependentTable::VirtualInterfaces,
    DependentTable::BlockDeviceMapping,
    DependentTable::SecurityGroupInstanceAssociation,
];

impl DependentTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::InstanceActions => "instance_actions",
            Self::InstanceFaults => "instance_faults",
            Self::InstanceInfoCaches => "instance_info_caches",
            Self::InstanceMetadata => "instance_metadata",
            Self::InstanceSystemMetadata => "instance_system_metadata",
            Self::Migrations => "migrations",
            Self::VirtualInterfaces => "virtual_interfaces",
            Self::BlockDeviceMapping => "block_device_mapping",
            Self::SecurityGroupInstanceAssociation => "security_group_instance_association",
        }
    }

    pub fn descriptor(&self) -> TableDescriptor {
        TableDescriptor {
            table: self.table_name(),
            key_column: "instance_uuid",
        }
    }
}

/// Every `(table, column)` pair the purge reads or matches on.
///
/// Checked once at startup so a schema drift fails the run before any
/// candidate is touched.
pub fn required_columns() -> Vec<(&'static str, &'static str)> {
    let mut columns = vec![
        (INSTANCES.table, "id"),
        (INSTANCES.table, "uuid"),
        (INSTANCES.table, "created_at"),
        (INSTANCES.table, "deleted_at"),
        (INSTANCES.table, "deleted"),
        (INSTANCES.table, "display_name"),
        (INSTANCES.table, "cell_name"),
        ("instance_actions", "id"),
        (INSTANCE_ACTIONS_EVENTS.table, INSTANCE_ACTIONS_EVENTS.key_column),
        (INSTANCE_ID_MAPPINGS.table, INSTANCE_ID_MAPPINGS.key_column),
    ];
    columns.extend(DEPENDENT_TABLES.iter().map(|t| {
        let d = t.descriptor();
        (d.table, d.key_column)
    }));
    columns
}
