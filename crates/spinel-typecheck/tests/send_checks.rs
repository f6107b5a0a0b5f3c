//! End-to-end message-send checking: instantiation, lookup dispatch,
//! casting, and module inclusion.

mod common;

use common::*;
use spinel_mem::names;
use spinel_typecheck::{
    ClassInfo, ErrorKind, ParamInfo, Signature, Ty, TypeError,
};

/// class A
///   sig 'initialize / Integer -> unit'
///   def initialize(num) 'String' end
///   sig 'a / -> Integer'
///   def a; 1 end
/// end
/// a = A.new(3)
/// A.new(a.a)
#[test]
fn instantiation_checks_initializer_and_returns_instance_type() {
    let mut fx = Fixture::new();
    let a_class = fx.sym("A");
    let num = fx.sym("num");
    let a_msg = fx.sym("a");

    fx.registry.register_class(ClassInfo::new(a_class));
    fx.registry.register_signature(
        a_class,
        names::INITIALIZE,
        false,
        Signature::new(
            vec![ParamInfo::required(num, Ty::Object(names::INTEGER))],
            Ty::Unit,
        ),
    );
    fx.registry.register_signature(
        a_class,
        a_msg,
        false,
        Signature::new(vec![], Ty::Object(names::INTEGER)),
    );

    let program = seq(vec![
        class_decl(
            a_class,
            Some(seq(vec![
                method_def(names::INITIALIZE, vec![req(num)], str_lit("String")),
                method_def(a_msg, vec![], int(1)),
            ])),
        ),
        asgn(a_msg, send(Some(cnst(a_class)), names::NEW, vec![int(3)])),
        send(
            Some(cnst(a_class)),
            names::NEW,
            vec![send(Some(lvar(a_msg)), a_msg, vec![])],
        ),
    ]);

    let ty = fx.check(&program).expect("program type checks");
    assert_eq!(ty, Ty::Object(a_class));
}

#[test]
fn missing_required_argument_is_fatal() {
    let mut fx = Fixture::new();
    let a_class = fx.sym("A");
    let num = fx.sym("num");

    fx.registry.register_class(ClassInfo::new(a_class));
    fx.registry.register_signature(
        a_class,
        names::INITIALIZE,
        false,
        Signature::new(
            vec![ParamInfo::required(num, Ty::Object(names::INTEGER))],
            Ty::Unit,
        ),
    );

    let program = send(Some(cnst(a_class)), names::NEW, vec![]);
    let err = fx.check(&program).unwrap_err();
    assert!(matches!(err, TypeError::MissingArgument { .. }));
    assert_eq!(err.kind(), ErrorKind::TypeCheck);
}

#[test]
fn wrong_initializer_argument_type_is_fatal_on_the_declaring_class() {
    let mut fx = Fixture::new();
    let a_class = fx.sym("A");
    let num = fx.sym("num");

    fx.registry.register_class(ClassInfo::new(a_class));
    fx.registry.register_signature(
        a_class,
        names::INITIALIZE,
        false,
        Signature::new(
            vec![ParamInfo::required(num, Ty::Object(names::INTEGER))],
            Ty::Unit,
        ),
    );

    let program = send(Some(cnst(a_class)), names::NEW, vec![str_lit("3")]);
    let err = fx.check(&program).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Uncomparable);
}

#[test]
fn absent_user_constructor_succeeds_through_the_ancestor_fallback() {
    let mut fx = Fixture::new();
    let b_class = fx.sym("B");
    fx.registry.register_class(ClassInfo::new(b_class));

    // No user constructor anywhere: the fallback is dynamic, any argument
    // list goes through.
    let program = send(
        Some(cnst(b_class)),
        names::NEW,
        vec![int(1), int(2), int(3)],
    );
    let ty = fx.check(&program).expect("default construction");
    assert_eq!(ty, Ty::Object(b_class));
}

#[test]
fn inherited_constructor_failures_are_swallowed() {
    let mut fx = Fixture::new();
    let a_class = fx.sym("A");
    let b_class = fx.sym("B");
    let num = fx.sym("num");

    fx.registry.register_class(ClassInfo::new(a_class));
    fx.registry
        .register_class(ClassInfo::new(b_class).with_superclass(a_class));
    fx.registry.register_signature(
        a_class,
        names::INITIALIZE,
        false,
        Signature::new(
            vec![ParamInfo::required(num, Ty::Object(names::INTEGER))],
            Ty::Unit,
        ),
    );

    // The initializer that applies belongs to A, not B: the failure is not
    // a user constructor on B, so instantiation succeeds.
    let program = send(Some(cnst(b_class)), names::NEW, vec![str_lit("nope")]);
    let ty = fx.check(&program).expect("inherited constructor is ignored");
    assert_eq!(ty, Ty::Object(b_class));
}

#[test]
fn unresolved_message_is_fatal() {
    let mut fx = Fixture::new();
    let missing = fx.sym("not_a_method");

    let program = send(Some(int(1)), missing, vec![]);
    let err = fx.check(&program).unwrap_err();
    assert!(matches!(err, TypeError::UnresolvedMessage { .. }));
    assert_eq!(err.kind(), ErrorKind::TypeCheck);
}

#[test]
fn dynamic_signature_never_raises_and_returns_its_declared_result() {
    let mut fx = Fixture::new();
    let c_class = fx.sym("C");
    let anything = fx.sym("anything");

    fx.registry.register_class(ClassInfo::new(c_class));
    fx.registry.register_signature(
        c_class,
        anything,
        false,
        Signature::dynamic_sig(anything, Ty::Object(names::INTEGER)),
    );

    let receiver = send(Some(cnst(c_class)), names::NEW, vec![]);
    let program = send(
        Some(receiver),
        anything,
        vec![str_lit("mixed"), int(3), str_lit("args")],
    );
    let ty = fx.check(&program).expect("escape signature");
    assert_eq!(ty, Ty::Object(names::INTEGER));
}

#[test]
fn cast_bypasses_checking_and_yields_the_requested_type() {
    let mut fx = Fixture::new();
    let program = send(
        Some(int(1)),
        names::CAST,
        vec![int(1), str_lit("String")],
    );
    let ty = fx.check(&program).expect("cast is an explicit escape");
    assert_eq!(ty, Ty::Object(names::STRING));
}

#[test]
fn local_variable_assignment_binds_and_reads_back() {
    let mut fx = Fixture::new();
    let x = fx.sym("x");
    let program = seq(vec![asgn(x, int(42)), lvar(x)]);
    assert_eq!(fx.check(&program), Ok(Ty::Object(names::INTEGER)));
}

#[test]
fn unresolved_local_is_fatal() {
    let mut fx = Fixture::new();
    let x = fx.sym("x");
    let err = fx.check(&lvar(x)).unwrap_err();
    assert!(matches!(err, TypeError::UnresolvedIdentifier { .. }));
}

#[test]
fn module_inclusion_verifies_the_recorded_capability_table() {
    let mut fx = Fixture::new();
    let m_module = fx.sym("M");
    let a_class = fx.sym("A");
    let size = fx.sym("size");

    fx.registry.register_module(m_module);
    fx.registry.register_class(ClassInfo::new(a_class));
    fx.registry.register_signature(
        a_class,
        size,
        false,
        Signature::new(vec![], Ty::Object(names::INTEGER)),
    );

    // module M sends `size` to its (existential) self; A provides it.
    let program = seq(vec![
        module_decl(m_module, Some(send(None, size, vec![]))),
        send(Some(cnst(a_class)), names::INCLUDE, vec![cnst(m_module)]),
    ]);
    let ty = fx.check(&program).expect("capability satisfied");
    assert_eq!(ty, Ty::Singleton(a_class));
}

#[test]
fn unmet_module_capability_is_fatal() {
    let mut fx = Fixture::new();
    let m_module = fx.sym("M");
    let b_class = fx.sym("B");
    let size = fx.sym("size");

    fx.registry.register_module(m_module);
    fx.registry.register_class(ClassInfo::new(b_class));

    let program = seq(vec![
        module_decl(m_module, Some(send(None, size, vec![]))),
        send(Some(cnst(b_class)), names::INCLUDE, vec![cnst(m_module)]),
    ]);
    let err = fx.check(&program).unwrap_err();
    assert!(matches!(err, TypeError::UnmetCapability { .. }));
    assert_eq!(err.kind(), ErrorKind::TypeCheck);
}

#[test]
fn including_a_non_module_is_fatal() {
    let mut fx = Fixture::new();
    let a_class = fx.sym("A");
    fx.registry.register_class(ClassInfo::new(a_class));

    let program = send(Some(cnst(a_class)), names::INCLUDE, vec![int(3)]);
    let err = fx.check(&program).unwrap_err();
    assert!(matches!(err, TypeError::NotAModule { .. }));
}

#[test]
fn super_resolves_against_the_parent_signature() {
    let mut fx = Fixture::new();
    let a_class = fx.sym("A");
    let b_class = fx.sym("B");
    let greet = fx.sym("greet");

    fx.registry.register_class(ClassInfo::new(a_class));
    fx.registry
        .register_class(ClassInfo::new(b_class).with_superclass(a_class));
    fx.registry.register_signature(
        a_class,
        greet,
        false,
        Signature::new(vec![], Ty::Object(names::STRING)),
    );
    fx.registry.register_signature(
        b_class,
        greet,
        false,
        Signature::new(vec![], Ty::Object(names::STRING)),
    );

    let program = class_decl(
        b_class,
        Some(method_def(
            greet,
            vec![],
            spinel_syntax::Term::SuperCall {
                args: Some(vec![]),
                span: sp(),
            },
        )),
    );
    fx.check(&program).expect("super resolves on the parent");
}

#[test]
fn conditional_branches_join_at_their_least_upper_bound() {
    let fx = Fixture::new();
    let program = spinel_syntax::Term::If {
        cond: Box::new(int(1)),
        then_branch: Some(Box::new(int(1))),
        else_branch: Some(Box::new(spinel_syntax::Term::Float {
            value: 2.5,
            span: sp(),
        })),
        span: sp(),
    };
    assert_eq!(fx.check(&program), Ok(Ty::Object(names::NUMERIC)));
}
