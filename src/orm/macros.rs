//! Declarative repository adapters.
//!
//! [`repository!`](crate::repository) turns a list of method signatures into a
//! typed adapter struct. Each generated async method converts its arguments,
//! forwards them to [`Repository::invoke`](crate::orm::Repository::invoke) and
//! unwraps the declared return shape.

/// Declare a repository adapter.
///
/// Each method names its verb (`insert`, `update`, `delete`, `query`), its
/// parameters with an optional binding, and a return shape (`Unit`, `Flag`,
/// `Key`, `Count`, `Entity`, `Optional`, `List`). Bindings are `cond("col")`,
/// `like("col")`, `column("col")` and `fields()`; unbound parameters are skipped.
///
/// ```ignore
/// repository! {
///     pub struct UserRepository: User {
///         insert fn save(user: User) -> Key;
///         query fn find_by_name(name: &str = like("name")) -> List;
///         update fn set_age(age: i32 = column("age"), id: i64 = cond("id")) -> Count;
///         delete fn remove(id: i64 = cond("id")) -> Flag;
///     }
/// }
/// ```
#[macro_export]
macro_rules! repository {
    (@bind) => {
        $crate::models::ParamBinding::unbound()
    };
    (@bind $kind:ident ( $( $column:literal )? )) => {
        $crate::models::ParamBinding::$kind( $( $column )? )
    };

    (@ret $entity:ty, Unit) => { () };
    (@ret $entity:ty, Flag) => { bool };
    (@ret $entity:ty, Key) => { i64 };
    (@ret $entity:ty, Count) => { u64 };
    (@ret $entity:ty, Entity) => { $entity };
    (@ret $entity:ty, Optional) => { ::std::option::Option<$entity> };
    (@ret $entity:ty, List) => { ::std::vec::Vec<$entity> };

    (@extract Unit, $returned:expr) => { $returned.into_unit() };
    (@extract Flag, $returned:expr) => { $returned.into_flag() };
    (@extract Key, $returned:expr) => { $returned.into_key() };
    (@extract Count, $returned:expr) => { $returned.into_count() };
    (@extract Entity, $returned:expr) => { $returned.into_entity() };
    (@extract Optional, $returned:expr) => { $returned.into_optional() };
    (@extract List, $returned:expr) => { $returned.into_list() };

    (
        $(#[$struct_meta:meta])*
        $vis:vis struct $name:ident : $entity:ty {
            $(
                $(#[$method_meta:meta])*
                $verb:ident fn $method:ident (
                    $( $arg:ident : $arg_ty:ty $( = $bind_kind:ident ( $( $bind_column:literal )? ) )? ),* $(,)?
                ) -> $shape:ident ;
            )*
        }
    ) => {
        $(#[$struct_meta])*
        $vis struct $name {
            inner: $crate::orm::Repository<$entity>,
        }

        impl $name {
            $(
                $(#[$method_meta])*
                pub async fn $method(
                    &self,
                    $( $arg: $arg_ty ),*
                ) -> $crate::error::DbResult<$crate::repository!(@ret $entity, $shape)> {
                    let args: ::std::vec::Vec<$crate::models::Argument> = ::std::vec![
                        $( $crate::models::IntoArgument::into_argument($arg)? ),*
                    ];
                    let returned = self.inner.invoke(stringify!($method), args).await?;
                    $crate::repository!(@extract $shape, returned)
                }
            )*
        }

        impl $crate::orm::RepositoryAdapter for $name {
            type Entity = $entity;

            const NAME: &'static str = stringify!($name);

            fn declare() -> $crate::error::DbResult<$crate::models::RepositoryDescriptor> {
                let methods = ::std::vec![
                    $(
                        $crate::models::MethodDescriptor::builder(stringify!($method))
                            .$verb()
                            .returns($crate::models::ReturnShape::$shape)
                            $(
                                .param($crate::repository!(@bind $( $bind_kind ( $( $bind_column )? ) )?))
                            )*
                            .build()?
                    ),*
                ];
                $crate::models::RepositoryDescriptor::for_entity::<$entity>(stringify!($name), methods)
            }

            fn from_repository(inner: $crate::orm::Repository<$entity>) -> Self {
                Self { inner }
            }

            fn repository(&self) -> &$crate::orm::Repository<$entity> {
                &self.inner
            }
        }

        impl ::std::cmp::PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                ::std::ptr::eq(self, other)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.inner, f)
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("inner", &self.inner)
                    .finish()
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::models::{
        IdStrategy, MatchKind, ParamBinding, RepositoryDescriptor, ReturnShape, Verb,
    };
    use crate::orm::RepositoryAdapter;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Book {
        id: Option<i64>,
        title: String,
        pages: i32,
    }

    crate::impl_entity! {
        Book => "Book" {
            id: Option<i64> [id(IdStrategy::AutoIncrement)],
            title: String,
            pages: i32,
        }
    }

    crate::repository! {
        /// Books by title.
        struct BookRepository: Book {
            insert fn add(book: Book) -> Key;
            query fn search(title: &str = like("title"), pages: i32 = cond("pages")) -> List;
            update fn retitle(title: String = column("title"), id: i64 = cond("id")) -> Count;
            update fn replace(book: Book = fields(), id: i64 = cond("id")) -> Flag;
            delete fn purge() -> Unit;
            query fn by_id(id: i64 = cond("id"), note: &str) -> Optional;
        }
    }

    #[test]
    fn test_declared_methods() {
        let descriptor: RepositoryDescriptor = BookRepository::declare().unwrap();
        assert_eq!(descriptor.name, "BookRepository");
        assert_eq!(descriptor.table, "Book");
        assert_eq!(descriptor.methods.len(), 6);

        let search = descriptor.method("search").unwrap();
        assert_eq!(search.verb, Verb::Query);
        assert_eq!(search.returns, ReturnShape::List);
        assert_eq!(
            search.params,
            vec![
                ParamBinding::Condition {
                    column: "title".to_string(),
                    kind: MatchKind::Like
                },
                ParamBinding::cond("pages"),
            ]
        );

        let replace = descriptor.method("replace").unwrap();
        assert_eq!(replace.params[0], ParamBinding::Fields);

        let by_id = descriptor.method("by_id").unwrap();
        assert_eq!(by_id.params[1], ParamBinding::Unbound);

        assert!(descriptor.method("purge").unwrap().params.is_empty());
    }

    #[test]
    fn test_adapter_name() {
        assert_eq!(BookRepository::NAME, "BookRepository");
    }
}
