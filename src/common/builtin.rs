//! Built-in type source
//!
//! Structural descriptions of the platform types the lowering depends on
//! (root object, strings, wrappers, collections, method handles, annotation
//! retention) and of the runtime support library. Only members the lowering
//! can reach are listed; a class-path source registered ahead of this one
//! takes precedence for every name it knows.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::codegen::bytecode::access_flags::*;
use crate::config::RuntimeNames;
use crate::error::Result;

use super::repository::{AnnotationStub, ClassStub, MemberStub, TypeSource};
use super::types::{ElementValue, PrimitiveKind};

const PUBLIC: u16 = ACC_PUBLIC;
const STATIC: u16 = ACC_PUBLIC | ACC_STATIC;
const ABSTRACT: u16 = ACC_PUBLIC | ACC_ABSTRACT;
const CONSTANT: u16 = ACC_PUBLIC | ACC_STATIC | ACC_FINAL;
const FINAL_CLASS: u16 = ACC_PUBLIC | ACC_FINAL | ACC_SUPER;
const CLASS: u16 = ACC_PUBLIC | ACC_SUPER;
const ABSTRACT_CLASS: u16 = ACC_PUBLIC | ACC_ABSTRACT | ACC_SUPER;
const INTERFACE: u16 = ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT;
const ANNOTATION: u16 = INTERFACE | ACC_ANNOTATION;

const OBJECT: &str = "Ljava/lang/Object;";
const STRING: &str = "Ljava/lang/String;";

struct StubBuilder(ClassStub);

impl StubBuilder {
    fn new(name: &str, access_flags: u16, super_name: Option<&str>) -> Self {
        Self(ClassStub {
            name: name.to_string(),
            access_flags,
            super_name: super_name.map(str::to_string),
            ..ClassStub::default()
        })
    }

    fn class(name: &str) -> Self {
        Self::new(name, CLASS, Some("java.lang.Object"))
    }

    fn interface(name: &str) -> Self {
        Self::new(name, INTERFACE, None)
    }

    fn flags(mut self, access_flags: u16) -> Self {
        self.0.access_flags = access_flags;
        self
    }

    fn extends(mut self, parent: &str) -> Self {
        self.0.super_name = Some(parent.to_string());
        self
    }

    fn implements(mut self, interfaces: &[&str]) -> Self {
        self.0.interfaces.extend(interfaces.iter().map(|i| i.to_string()));
        self
    }

    fn field(mut self, name: &str, descriptor: &str, flags: u16) -> Self {
        self.0.fields.push(MemberStub::new(name, descriptor, flags));
        self
    }

    fn method(mut self, name: &str, descriptor: &str, flags: u16) -> Self {
        self.0.methods.push(MemberStub::new(name, descriptor, flags));
        self
    }

    fn ctor(self, descriptor: &str) -> Self {
        self.method("<init>", descriptor, PUBLIC)
    }

    fn retention(mut self, policy: &str) -> Self {
        self.0.annotations.push(AnnotationStub {
            type_name: "java.lang.annotation.Retention".to_string(),
            values: vec![(
                "value".to_string(),
                ElementValue::Enum {
                    type_name: "java.lang.annotation.RetentionPolicy".to_string(),
                    constant: policy.to_string(),
                },
            )],
        });
        self
    }

    fn build(self) -> ClassStub {
        self.0
    }
}

fn object_methods(b: StubBuilder) -> StubBuilder {
    b.method("equals", "(Ljava/lang/Object;)Z", PUBLIC)
        .method("hashCode", "()I", PUBLIC)
        .method("toString", "()Ljava/lang/String;", PUBLIC)
}

fn throwable(name: &str, parent: &str) -> ClassStub {
    StubBuilder::class(name)
        .extends(parent)
        .ctor("()V")
        .ctor("(Ljava/lang/String;)V")
        .ctor("(Ljava/lang/String;Ljava/lang/Throwable;)V")
        .build()
}

fn wrapper(kind: PrimitiveKind) -> ClassStub {
    let name = kind.wrapper();
    let own = format!("L{};", name.replace('.', "/"));
    let prim = kind.descriptor();
    let parent = if kind.is_numeric() && kind != PrimitiveKind::Char { "java.lang.Number" } else { "java.lang.Object" };
    let mut b = StubBuilder::class(name)
        .flags(FINAL_CLASS)
        .extends(parent)
        .implements(&["java.io.Serializable", "java.lang.Comparable"])
        .field("TYPE", "Ljava/lang/Class;", CONSTANT)
        .ctor(&format!("({})V", prim))
        .method("valueOf", &format!("({}){}", prim, own), STATIC)
        .method("compareTo", &format!("({})I", own), PUBLIC)
        .method("toString", &format!("({})Ljava/lang/String;", prim), STATIC);
    b = object_methods(b);
    if parent == "java.lang.Number" {
        for target in [
            PrimitiveKind::Byte,
            PrimitiveKind::Short,
            PrimitiveKind::Int,
            PrimitiveKind::Long,
            PrimitiveKind::Float,
            PrimitiveKind::Double,
        ] {
            b = b.method(&target.unbox_method(), &format!("(){}", target.descriptor()), PUBLIC);
        }
        b = b
            .field("MAX_VALUE", &prim.to_string(), CONSTANT)
            .field("MIN_VALUE", &prim.to_string(), CONSTANT);
    } else {
        b = b.method(&kind.unbox_method(), &format!("(){}", prim), PUBLIC);
    }
    b.build()
}

fn platform_types() -> HashMap<String, ClassStub> {
    let mut types = vec![
        object_methods(StubBuilder::new("java.lang.Object", CLASS, None))
            .ctor("()V")
            .method("getClass", "()Ljava/lang/Class;", PUBLIC | ACC_FINAL)
            .method("clone", "()Ljava/lang/Object;", ACC_PROTECTED)
            .method("finalize", "()V", ACC_PROTECTED)
            .build(),
        object_methods(StubBuilder::class("java.lang.String"))
            .flags(FINAL_CLASS)
            .implements(&["java.io.Serializable", "java.lang.Comparable", "java.lang.CharSequence"])
            .ctor("()V")
            .ctor("(Ljava/lang/String;)V")
            .method("length", "()I", PUBLIC)
            .method("charAt", "(I)C", PUBLIC)
            .method("isEmpty", "()Z", PUBLIC)
            .method("concat", "(Ljava/lang/String;)Ljava/lang/String;", PUBLIC)
            .method("compareTo", "(Ljava/lang/String;)I", PUBLIC)
            .method("substring", "(I)Ljava/lang/String;", PUBLIC)
            .method("substring", "(II)Ljava/lang/String;", PUBLIC)
            .method("indexOf", "(Ljava/lang/String;)I", PUBLIC)
            .method("startsWith", "(Ljava/lang/String;)Z", PUBLIC)
            .method("endsWith", "(Ljava/lang/String;)Z", PUBLIC)
            .method("contains", "(Ljava/lang/CharSequence;)Z", PUBLIC)
            .method("trim", "()Ljava/lang/String;", PUBLIC)
            .method("toUpperCase", "()Ljava/lang/String;", PUBLIC)
            .method("toLowerCase", "()Ljava/lang/String;", PUBLIC)
            .method("valueOf", "(Ljava/lang/Object;)Ljava/lang/String;", STATIC)
            .method("valueOf", "(Z)Ljava/lang/String;", STATIC)
            .method("valueOf", "(C)Ljava/lang/String;", STATIC)
            .method("valueOf", "(I)Ljava/lang/String;", STATIC)
            .method("valueOf", "(J)Ljava/lang/String;", STATIC)
            .method("valueOf", "(F)Ljava/lang/String;", STATIC)
            .method("valueOf", "(D)Ljava/lang/String;", STATIC)
            .build(),
        StubBuilder::interface("java.lang.CharSequence")
            .method("length", "()I", ABSTRACT)
            .method("charAt", "(I)C", ABSTRACT)
            .build(),
        StubBuilder::interface("java.lang.Comparable").method("compareTo", "(Ljava/lang/Object;)I", ABSTRACT).build(),
        StubBuilder::interface("java.lang.Cloneable").build(),
        StubBuilder::interface("java.io.Serializable").build(),
        StubBuilder::interface("java.lang.Runnable").method("run", "()V", ABSTRACT).build(),
        StubBuilder::interface("java.lang.Iterable").method("iterator", "()Ljava/util/Iterator;", ABSTRACT).build(),
        StubBuilder::class("java.lang.Number")
            .flags(ABSTRACT_CLASS)
            .implements(&["java.io.Serializable"])
            .ctor("()V")
            .method("intValue", "()I", ABSTRACT)
            .method("longValue", "()J", ABSTRACT)
            .method("floatValue", "()F", ABSTRACT)
            .method("doubleValue", "()D", ABSTRACT)
            .method("byteValue", "()B", PUBLIC)
            .method("shortValue", "()S", PUBLIC)
            .build(),
        StubBuilder::class("java.lang.Void").flags(FINAL_CLASS).field("TYPE", "Ljava/lang/Class;", CONSTANT).build(),
        StubBuilder::class("java.lang.Class")
            .flags(FINAL_CLASS)
            .method("getName", "()Ljava/lang/String;", PUBLIC)
            .method("isInstance", "(Ljava/lang/Object;)Z", PUBLIC)
            .method("cast", "(Ljava/lang/Object;)Ljava/lang/Object;", PUBLIC)
            .build(),
        StubBuilder::class("java.lang.Enum")
            .flags(ABSTRACT_CLASS)
            .implements(&["java.lang.Comparable", "java.io.Serializable"])
            .method("name", "()Ljava/lang/String;", PUBLIC | ACC_FINAL)
            .method("ordinal", "()I", PUBLIC | ACC_FINAL)
            .build(),
        StubBuilder::class("java.lang.Throwable")
            .implements(&["java.io.Serializable"])
            .ctor("()V")
            .ctor("(Ljava/lang/String;)V")
            .ctor("(Ljava/lang/String;Ljava/lang/Throwable;)V")
            .method("getMessage", "()Ljava/lang/String;", PUBLIC)
            .method("getCause", "()Ljava/lang/Throwable;", PUBLIC)
            .method("printStackTrace", "()V", PUBLIC)
            .build(),
        throwable("java.lang.Exception", "java.lang.Throwable"),
        throwable("java.lang.Error", "java.lang.Throwable"),
        throwable("java.lang.RuntimeException", "java.lang.Exception"),
        throwable("java.lang.IllegalArgumentException", "java.lang.RuntimeException"),
        throwable("java.lang.IllegalStateException", "java.lang.RuntimeException"),
        throwable("java.lang.UnsupportedOperationException", "java.lang.RuntimeException"),
        throwable("java.lang.ArithmeticException", "java.lang.RuntimeException"),
        throwable("java.lang.ClassCastException", "java.lang.RuntimeException"),
        throwable("java.lang.NullPointerException", "java.lang.RuntimeException"),
        throwable("java.lang.IndexOutOfBoundsException", "java.lang.RuntimeException"),
        StubBuilder::class("java.lang.Math")
            .flags(FINAL_CLASS)
            .method("abs", "(I)I", STATIC)
            .method("abs", "(J)J", STATIC)
            .method("abs", "(D)D", STATIC)
            .method("max", "(II)I", STATIC)
            .method("max", "(JJ)J", STATIC)
            .method("max", "(DD)D", STATIC)
            .method("min", "(II)I", STATIC)
            .method("min", "(JJ)J", STATIC)
            .method("min", "(DD)D", STATIC)
            .method("sqrt", "(D)D", STATIC)
            .method("pow", "(DD)D", STATIC)
            .method("floor", "(D)D", STATIC)
            .method("ceil", "(D)D", STATIC)
            .build(),
        StubBuilder::class("java.lang.System")
            .flags(FINAL_CLASS)
            .field("out", "Ljava/io/PrintStream;", CONSTANT)
            .field("err", "Ljava/io/PrintStream;", CONSTANT)
            .method("currentTimeMillis", "()J", STATIC)
            .method("nanoTime", "()J", STATIC)
            .method("identityHashCode", "(Ljava/lang/Object;)I", STATIC)
            .method("arraycopy", "(Ljava/lang/Object;ILjava/lang/Object;II)V", STATIC)
            .build(),
        StubBuilder::class("java.io.PrintStream")
            .method("println", "()V", PUBLIC)
            .method("println", "(Ljava/lang/Object;)V", PUBLIC)
            .method("println", "(Ljava/lang/String;)V", PUBLIC)
            .method("println", "(Z)V", PUBLIC)
            .method("println", "(C)V", PUBLIC)
            .method("println", "(I)V", PUBLIC)
            .method("println", "(J)V", PUBLIC)
            .method("println", "(D)V", PUBLIC)
            .method("print", "(Ljava/lang/Object;)V", PUBLIC)
            .method("print", "(Ljava/lang/String;)V", PUBLIC)
            .build(),
        object_methods(StubBuilder::class("java.lang.StringBuilder"))
            .flags(FINAL_CLASS)
            .implements(&["java.io.Serializable", "java.lang.CharSequence"])
            .ctor("()V")
            .ctor("(Ljava/lang/String;)V")
            .method("append", "(Ljava/lang/Object;)Ljava/lang/StringBuilder;", PUBLIC)
            .method("append", "(Ljava/lang/String;)Ljava/lang/StringBuilder;", PUBLIC)
            .method("append", "(Z)Ljava/lang/StringBuilder;", PUBLIC)
            .method("append", "(C)Ljava/lang/StringBuilder;", PUBLIC)
            .method("append", "(I)Ljava/lang/StringBuilder;", PUBLIC)
            .method("append", "(J)Ljava/lang/StringBuilder;", PUBLIC)
            .method("append", "(D)Ljava/lang/StringBuilder;", PUBLIC)
            .method("length", "()I", PUBLIC)
            .method("charAt", "(I)C", PUBLIC)
            .build(),
        // annotations
        StubBuilder::interface("java.lang.annotation.Annotation")
            .method("annotationType", "()Ljava/lang/Class;", ABSTRACT)
            .build(),
        StubBuilder::new("java.lang.annotation.Retention", ANNOTATION, None)
            .implements(&["java.lang.annotation.Annotation"])
            .method("value", "()Ljava/lang/annotation/RetentionPolicy;", ABSTRACT)
            .retention("RUNTIME")
            .build(),
        StubBuilder::class("java.lang.annotation.RetentionPolicy")
            .flags(FINAL_CLASS | ACC_ENUM)
            .extends("java.lang.Enum")
            .field("SOURCE", "Ljava/lang/annotation/RetentionPolicy;", CONSTANT | ACC_ENUM)
            .field("CLASS", "Ljava/lang/annotation/RetentionPolicy;", CONSTANT | ACC_ENUM)
            .field("RUNTIME", "Ljava/lang/annotation/RetentionPolicy;", CONSTANT | ACC_ENUM)
            .build(),
        StubBuilder::new("java.lang.Deprecated", ANNOTATION, None)
            .implements(&["java.lang.annotation.Annotation"])
            .retention("RUNTIME")
            .build(),
        StubBuilder::new("java.lang.FunctionalInterface", ANNOTATION, None)
            .implements(&["java.lang.annotation.Annotation"])
            .retention("RUNTIME")
            .build(),
        StubBuilder::new("java.lang.Override", ANNOTATION, None)
            .implements(&["java.lang.annotation.Annotation"])
            .retention("SOURCE")
            .build(),
        // collections
        StubBuilder::interface("java.util.Iterator")
            .method("hasNext", "()Z", ABSTRACT)
            .method("next", "()Ljava/lang/Object;", ABSTRACT)
            .method("remove", "()V", PUBLIC)
            .build(),
        StubBuilder::interface("java.util.Collection")
            .implements(&["java.lang.Iterable"])
            .method("size", "()I", ABSTRACT)
            .method("isEmpty", "()Z", ABSTRACT)
            .method("contains", "(Ljava/lang/Object;)Z", ABSTRACT)
            .method("add", "(Ljava/lang/Object;)Z", ABSTRACT)
            .method("remove", "(Ljava/lang/Object;)Z", ABSTRACT)
            .method("clear", "()V", ABSTRACT)
            .build(),
        StubBuilder::interface("java.util.List")
            .implements(&["java.util.Collection"])
            .method("get", "(I)Ljava/lang/Object;", ABSTRACT)
            .method("set", "(ILjava/lang/Object;)Ljava/lang/Object;", ABSTRACT)
            .method("add", "(ILjava/lang/Object;)V", ABSTRACT)
            .method("indexOf", "(Ljava/lang/Object;)I", ABSTRACT)
            .build(),
        object_methods(StubBuilder::class("java.util.ArrayList"))
            .implements(&["java.util.List", "java.lang.Cloneable", "java.io.Serializable"])
            .ctor("()V")
            .ctor("(I)V")
            .ctor("(Ljava/util/Collection;)V")
            .method("size", "()I", PUBLIC)
            .method("isEmpty", "()Z", PUBLIC)
            .method("contains", "(Ljava/lang/Object;)Z", PUBLIC)
            .method("add", "(Ljava/lang/Object;)Z", PUBLIC)
            .method("add", "(ILjava/lang/Object;)V", PUBLIC)
            .method("remove", "(Ljava/lang/Object;)Z", PUBLIC)
            .method("clear", "()V", PUBLIC)
            .method("get", "(I)Ljava/lang/Object;", PUBLIC)
            .method("set", "(ILjava/lang/Object;)Ljava/lang/Object;", PUBLIC)
            .method("indexOf", "(Ljava/lang/Object;)I", PUBLIC)
            .method("iterator", "()Ljava/util/Iterator;", PUBLIC)
            .build(),
        StubBuilder::interface("java.util.Map")
            .method("size", "()I", ABSTRACT)
            .method("isEmpty", "()Z", ABSTRACT)
            .method("get", "(Ljava/lang/Object;)Ljava/lang/Object;", ABSTRACT)
            .method("put", "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;", ABSTRACT)
            .method("containsKey", "(Ljava/lang/Object;)Z", ABSTRACT)
            .method("remove", "(Ljava/lang/Object;)Ljava/lang/Object;", ABSTRACT)
            .build(),
        object_methods(StubBuilder::class("java.util.HashMap"))
            .implements(&["java.util.Map", "java.lang.Cloneable", "java.io.Serializable"])
            .ctor("()V")
            .method("size", "()I", PUBLIC)
            .method("isEmpty", "()Z", PUBLIC)
            .method("get", "(Ljava/lang/Object;)Ljava/lang/Object;", PUBLIC)
            .method("put", "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;", PUBLIC)
            .method("containsKey", "(Ljava/lang/Object;)Z", PUBLIC)
            .method("remove", "(Ljava/lang/Object;)Ljava/lang/Object;", PUBLIC)
            .build(),
        StubBuilder::interface("java.util.Comparator")
            .method("compare", "(Ljava/lang/Object;Ljava/lang/Object;)I", ABSTRACT)
            .method("equals", "(Ljava/lang/Object;)Z", ABSTRACT)
            .build(),
        StubBuilder::interface("java.util.function.Function")
            .method("apply", "(Ljava/lang/Object;)Ljava/lang/Object;", ABSTRACT)
            .build(),
        StubBuilder::interface("java.util.function.BiFunction")
            .method("apply", "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;", ABSTRACT)
            .build(),
        StubBuilder::interface("java.util.function.Supplier").method("get", "()Ljava/lang/Object;", ABSTRACT).build(),
        StubBuilder::interface("java.util.function.Consumer").method("accept", "(Ljava/lang/Object;)V", ABSTRACT).build(),
        StubBuilder::interface("java.util.function.Predicate").method("test", "(Ljava/lang/Object;)Z", ABSTRACT).build(),
        // method handles
        StubBuilder::class("java.lang.invoke.MethodHandle")
            .flags(ABSTRACT_CLASS)
            .method("invokeWithArguments", "(Ljava/util/List;)Ljava/lang/Object;", PUBLIC)
            .build(),
        StubBuilder::class("java.lang.invoke.MethodHandles")
            .flags(FINAL_CLASS)
            .method("lookup", "()Ljava/lang/invoke/MethodHandles$Lookup;", STATIC)
            .build(),
        StubBuilder::class("java.lang.invoke.MethodHandles$Lookup").flags(FINAL_CLASS).build(),
        StubBuilder::class("java.lang.invoke.MethodType").flags(FINAL_CLASS).build(),
        StubBuilder::class("java.lang.invoke.CallSite").flags(ABSTRACT_CLASS).build(),
        StubBuilder::class("java.lang.invoke.LambdaMetafactory")
            .method(
                "metafactory",
                "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;\
                 Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;Ljava/lang/invoke/MethodType;)\
                 Ljava/lang/invoke/CallSite;",
                STATIC,
            )
            .build(),
    ];
    for kind in PrimitiveKind::ALL {
        types.push(wrapper(kind));
    }
    types.into_iter().map(|stub| (stub.name.clone(), stub)).collect()
}

static PLATFORM: Lazy<HashMap<String, ClassStub>> = Lazy::new(platform_types);

/// Stubs of the runtime support library under the configured names
fn runtime_types(names: &RuntimeNames) -> Vec<ClassStub> {
    let mut runtime = StubBuilder::class(&names.runtime_class).flags(FINAL_CLASS);
    for kind in PrimitiveKind::ALL {
        runtime = runtime.method(kind.coercion_helper(), &format!("({}){}", OBJECT, kind.descriptor()), STATIC);
    }
    let runtime = runtime
        .method("cast", "(Ljava/lang/Object;Ljava/lang/Class;)Ljava/lang/Object;", STATIC)
        .method("compare", "(II)Z", STATIC)
        .method("is", "(Ljava/lang/Object;Ljava/lang/Object;)Z", STATIC)
        .method("not", "(Ljava/lang/Object;Ljava/lang/Object;)Z", STATIC)
        .method("isRef", "(Ljava/lang/Object;Ljava/lang/Object;)Z", STATIC)
        .method("notRef", "(Ljava/lang/Object;Ljava/lang/Object;)Z", STATIC)
        .method("getField", &format!("({}{}Ljava/lang/Class;){}", OBJECT, STRING, OBJECT), STATIC)
        .method("putField", &format!("({}{}{}Ljava/lang/Class;)V", OBJECT, STRING, OBJECT), STATIC)
        .method("iterator", "(Ljava/lang/Object;)Ljava/util/Iterator;", STATIC)
        .build();
    let dynamic = StubBuilder::class(&names.dynamic_class)
        .flags(FINAL_CLASS)
        .method(
            "bootstrap",
            "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;)\
             Ljava/lang/invoke/CallSite;",
            STATIC,
        )
        .build();
    let mut out = vec![runtime, dynamic];
    for arity in 0..=MAX_FUNCTION_ARITY {
        let desc = format!("({}){}", OBJECT.repeat(arity), OBJECT);
        out.push(StubBuilder::interface(&names.function_type(arity)).method("apply", &desc, ABSTRACT).build());
    }
    out
}

/// Highest arity with a `FunctionN` interface
pub const MAX_FUNCTION_ARITY: usize = 26;

/// Type source backed by the built-in tables
pub struct BuiltinSource {
    runtime: HashMap<String, ClassStub>,
}

impl BuiltinSource {
    pub fn new(names: &RuntimeNames) -> Self {
        let runtime = runtime_types(names).into_iter().map(|stub| (stub.name.clone(), stub)).collect();
        Self { runtime }
    }
}

impl TypeSource for BuiltinSource {
    fn describe(&self) -> String {
        format!("builtin ({} platform types, {} runtime types)", PLATFORM.len(), self.runtime.len())
    }

    fn load(&self, full_name: &str) -> Result<Option<ClassStub>> {
        Ok(PLATFORM.get(full_name).or_else(|| self.runtime.get(full_name)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::descriptor::parse_method_descriptor;
    use crate::common::repository::TypeRepository;

    #[test]
    fn test_descriptors_are_well_formed() {
        let source = BuiltinSource::new(&RuntimeNames::default());
        let all = PLATFORM.values().chain(source.runtime.values());
        for stub in all {
            for m in &stub.methods {
                assert!(parse_method_descriptor(&m.descriptor).is_ok(), "{}.{}", stub.name, m.name);
            }
        }
    }

    #[test]
    fn test_repository_resolves_builtins() {
        let mut repo = TypeRepository::new().with_source(Box::new(BuiltinSource::new(&RuntimeNames::default())));
        let list = repo.resolve("java.util.ArrayList").unwrap().unwrap();
        let collection = repo.resolve("java.util.Collection").unwrap().unwrap();
        assert!(repo.is_assignable(list, collection));
        let f2 = repo.resolve("lt.lang.function.Function2").unwrap().unwrap();
        let apply = repo.method(repo.methods_of(f2)[0]);
        assert_eq!(apply.params.len(), 2);
        let retention = repo.resolve("java.lang.annotation.Retention").unwrap().unwrap();
        let info = repo.get(retention).ref_info().unwrap();
        assert_eq!(info.annotations[0].ty, retention);
    }

    #[test]
    fn test_wrappers_expose_unboxing() {
        let mut repo = TypeRepository::new().with_source(Box::new(BuiltinSource::new(&RuntimeNames::default())));
        let long = repo.resolve("java.lang.Long").unwrap().unwrap();
        assert!(repo.methods_of(long).iter().any(|m| repo.method(*m).name == "longValue"));
        let number = repo.resolve("java.lang.Number").unwrap().unwrap();
        assert_eq!(repo.parent_of(long), Some(number));
    }
}
