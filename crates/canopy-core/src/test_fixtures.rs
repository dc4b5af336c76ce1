use crate::{
    arena::Handle,
    document::Workspace,
    entity::Entity,
    schema::{Cardinality, KindId, KindSpec, SchemaRegistry},
    serialize::{NodeWriter, SerializeError},
    unserialize::{NodeReader, UnserializeError},
    value::{ScalarType, Value},
};

//
// A small demonstration schema exercising every engine feature: named
// leaves, bodies, optional attributes, containers, legacy tags,
// references, seeds, clone bans, and custom hooks.
//

pub struct Fixture {
    pub ws: Workspace,
    pub property: KindId,
    pub alias: KindId,
    pub component: KindId,
    pub assembly: KindId,
    pub noise: KindId,
    pub opaque: KindId,
    pub interval: KindId,
}

pub fn fixture() -> Fixture {
    let mut reg = SchemaRegistry::new();

    let property = reg
        .register(
            KindSpec::new("Property")
                .named()
                .attr_default("units", ScalarType::Text, Value::from("dimensionless"))
                .body(ScalarType::Real, false),
        )
        .expect("fresh kind");
    let alias = reg
        .register(KindSpec::new("Alias").named().body(ScalarType::Text, false))
        .expect("fresh kind");
    let noise = reg
        .register(
            KindSpec::new("Noise")
                .named()
                .seeded("seed")
                .attr_default("seed", ScalarType::Int, Value::Int(0)),
        )
        .expect("fresh kind");
    let opaque = reg
        .register(KindSpec::new("Opaque").named().no_clone())
        .expect("fresh kind");
    let interval = reg
        .register(
            KindSpec::new("Interval")
                .named()
                .attr("lo", ScalarType::Real)
                .attr("hi", ScalarType::Real)
                .on_serialize(serialize_interval)
                .on_construct(construct_interval),
        )
        .expect("fresh kind");
    let component = reg
        .register(
            KindSpec::new("Component")
                .document_level()
                .legacy("ComponentClass")
                .child("Property", "property", Cardinality::ZeroOrMore, false)
                .child("Alias", "alias", Cardinality::ZeroOrMore, false)
                .child("Noise", "noise", Cardinality::ZeroOrMore, false)
                .child("Opaque", "opaque", Cardinality::ZeroOrMore, false)
                .child("Interval", "interval", Cardinality::ZeroOrMore, false),
        )
        .expect("fresh kind");
    let assembly = reg
        .register(
            KindSpec::new("Assembly")
                .document_level()
                .child("Component", "member", Cardinality::ZeroOrMore, true)
                .child("Assembly", "sub", Cardinality::ZeroOrMore, true),
        )
        .expect("fresh kind");

    Fixture {
        ws: Workspace::new(reg),
        property,
        alias,
        component,
        assembly,
        noise,
        opaque,
        interval,
    }
}

impl Fixture {
    pub fn property(&mut self, name: &str, value: f64) -> Handle {
        let mut entity = Entity::named(self.property, name);
        entity.body = Some(Value::Real(value));

        self.ws.insert(entity)
    }

    pub fn alias(&mut self, name: &str, target: &str) -> Handle {
        let mut entity = Entity::named(self.alias, name);
        entity.body = Some(Value::from(target));

        self.ws.insert(entity)
    }

    pub fn component(&mut self, name: &str, properties: &[(&str, f64)]) -> Handle {
        let component = self.ws.insert(Entity::named(self.component, name));
        for (prop_name, value) in properties {
            let prop = self.property(prop_name, *value);
            self.ws.add_member(component, prop).expect("declared role");
        }

        component
    }

    pub fn assembly(&mut self, name: &str, members: &[Handle]) -> Handle {
        let assembly = self.ws.insert(Entity::named(self.assembly, name));
        for member in members {
            self.ws.add_member(assembly, *member).expect("declared role");
        }

        assembly
    }
}

fn serialize_interval(entity: &Entity, writer: &mut NodeWriter<'_>) -> Result<(), SerializeError> {
    writer.attr("name", entity.name.clone().unwrap_or_default())?;
    for attr in ["lo", "hi"] {
        let value = entity
            .attr(attr)
            .cloned()
            .ok_or_else(|| SerializeError::MissingAttribute {
                kind: "Interval".to_string(),
                attr: attr.to_string(),
            })?;
        writer.attr(attr, value)?;
    }

    Ok(())
}

fn construct_interval(reader: &mut NodeReader<'_>) -> Result<Entity, UnserializeError> {
    let mut entity = Entity::named(reader.kind(), reader.name()?);
    let lo: f64 = reader.attr("lo")?;
    let hi: f64 = reader.attr("hi")?;
    entity.set_attr("lo", lo);
    entity.set_attr("hi", hi);

    Ok(entity)
}
