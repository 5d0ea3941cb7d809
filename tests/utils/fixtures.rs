use bindex::btype::{BType, ClassSpec, EnumSpec};
use bindex::bvalue::{ArrayValue, HostObject, Value};
use bindex::invoke_err::InvokeError;
use bindex::members::{MemberRegistry, MethodSpec, ParamSpec};
use bindex::{Services, TypeTable};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;

lazy_static::lazy_static! {
    pub static ref PERSON: Arc<ClassSpec> = ClassSpec::new("Person");
    pub static ref EMPLOYEE: Arc<ClassSpec> = ClassSpec::derived("Employee", PERSON.clone());
    pub static ref COLOR: Arc<EnumSpec> = EnumSpec::new("Color", ["Red", "Green", "Blue"]);
}

#[derive(Debug)]
pub struct Person {
    class: Arc<ClassSpec>,
    pub name: Mutex<String>,
    pub age: i64,
    pub rank: Option<i64>,
    pub tags: Vec<String>,
    pub manager: Option<Value>,
    pub company: Option<String>,
}

impl Person {
    pub fn new(name: &str, age: i64) -> Self {
        Self {
            class: PERSON.clone(),
            name: Mutex::new(name.to_string()),
            age,
            rank: None,
            tags: vec![],
            manager: None,
            company: None,
        }
    }

    pub fn employee(name: &str, age: i64, company: &str) -> Self {
        Self {
            class: EMPLOYEE.clone(),
            company: Some(company.to_string()),
            ..Self::new(name, age)
        }
    }
}

impl HostObject for Person {
    fn class(&self) -> Arc<ClassSpec> {
        self.class.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn person(value: &Value) -> Result<&Person, InvokeError> {
    value.downcast::<Person>().ok_or_else(|| InvokeError::InvalidCast {
        from: value.runtime_type().to_string(),
        to: "Person".to_string(),
    })
}

pub fn person_type() -> BType {
    BType::Class(PERSON.clone())
}

/// Ada, managed by Grace, ranked first
pub fn ada() -> Value {
    let grace = Person {
        rank: Some(7),
        ..Person::new("Grace", 85)
    };
    Value::object(Person {
        rank: Some(1),
        tags: vec!["math".to_string(), "engines".to_string(), "poetry".to_string()],
        manager: Some(Value::object(grace)),
        ..Person::new("Ada", 36)
    })
}

/// Bob, without a manager or a rank
pub fn bob() -> Value {
    Value::object(Person::new("Bob", 17))
}

pub fn eve() -> Value {
    Value::object(Person::employee("Eve", 29, "Initech"))
}

fn add_person_members(registry: &MemberRegistry) {
    registry.add_property(
        person_type(),
        "Name",
        BType::String,
        |target| Ok(Value::from(person(target)?.name.lock().clone())),
        |target, value| {
            *person(target)?.name.lock() = value.to_string();
            Ok(())
        },
    );
    registry.add_accessor(person_type(), "Age", BType::Int, |target| {
        Ok(Value::Int(person(target)?.age))
    });
    registry.add_accessor(person_type(), "Rank", BType::nullable(BType::Int), |target| {
        Ok(person(target)?.rank.into())
    });
    registry.add_accessor(person_type(), "Manager", person_type(), |target| {
        Ok(person(target)?.manager.clone().unwrap_or(Value::Null))
    });
    registry.add_accessor(
        person_type(),
        "Tags",
        BType::array(BType::String),
        |target| {
            let tags = person(target)?.tags.iter().map(|t| Value::str(t)).collect();
            Ok(ArrayValue::new(BType::String, tags))
        },
    );
    registry.add_accessor(BType::Class(EMPLOYEE.clone()), "Company", BType::String, |target| {
        Ok(person(target)?.company.clone().into())
    });
    registry.add_method(
        person_type(),
        "Greet",
        MethodSpec::new(
            vec![ParamSpec::with_default("greeting", BType::String, "Hello")],
            BType::String,
            |inv| {
                let name = person(inv.target)?.name.lock().clone();
                Ok(Value::from(format!("{}, {name}", inv.str(0)?)))
            },
        ),
    );
    registry.add_method(
        person_type(),
        "Describe",
        MethodSpec::new(vec![ParamSpec::new("value", BType::Int)], BType::String, |inv| {
            Ok(Value::from(format!("int {}", inv.int(0)?)))
        }),
    );
    registry.add_method(
        person_type(),
        "Describe",
        MethodSpec::new(
            vec![ParamSpec::new("value", BType::Object)],
            BType::String,
            |inv| Ok(Value::from(format!("object {}", inv.arg(0)?))),
        ),
    );
    registry.add_method(
        person_type(),
        "Total",
        MethodSpec::new(
            vec![
                ParamSpec::new("first", BType::Int),
                ParamSpec::params("rest", BType::Int),
            ],
            BType::Int,
            |inv| {
                let rest: i64 = inv.array(1)?.items.iter().filter_map(Value::as_int).sum();
                Ok(Value::Int(inv.int(0)? + rest))
            },
        ),
    );
    registry.add_method(
        person_type(),
        "Label",
        MethodSpec::new(
            vec![ParamSpec::new("count", BType::Int), ParamSpec::metadata("metadata")],
            BType::String,
            |inv| {
                let culture = match inv.arg(1)? {
                    Value::Metadata(md) => md.get("culture").map(Value::to_string),
                    _ => None,
                };
                Ok(Value::from(format!(
                    "{}:{}",
                    culture.unwrap_or_else(|| "invariant".to_string()),
                    inv.int(0)?
                )))
            },
        ),
    );
    registry.add_static_method(
        person_type(),
        "Blank",
        MethodSpec::generic(&["T"], vec![], BType::generic("T"), |_| Ok(Value::Null)),
    );
    registry.add_method(
        person_type(),
        "Older",
        MethodSpec::new(
            vec![ParamSpec::new("years", BType::Int)],
            person_type(),
            |inv| {
                let p = person(inv.target)?;
                let older = Person::new(&p.name.lock(), p.age + inv.int(0)?);
                Ok(Value::object(older))
            },
        ),
    );
}

/// the standard services plus the fixture types
pub fn fixture_services() -> Services {
    let registry = bindex::builtin::std_members();
    add_person_members(&registry);
    let types = TypeTable::new();
    types.add("Math", bindex::builtin::math::MATH.clone());
    types.add("Person", person_type());
    types.add("Employee", BType::Class(EMPLOYEE.clone()));
    types.add("Color", BType::Enum(COLOR.clone()));
    Services::new(registry, Arc::new(types))
}
