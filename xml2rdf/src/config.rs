//! Conversion rules.
//!
//! A [`Config`] is built once with a [`ConfigBuilder`] and then shared
//! read-only by any number of conversions, typically through an `Arc`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use oxiri::Iri;
use oxrdf::NamedNode;
use vec1::Vec1;

use crate::composite::CompositeIdRule;
use crate::element::{ClosedElement, SyntheticElement};
use crate::rename::PathTrie;

pub type StringTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

pub type DelayedTransform = Arc<dyn Fn(&ClosedElement<'_>) -> Vec<SyntheticElement> + Send + Sync>;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Which names a namespace rule is applied to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppliesTo {
    OnlyElements,
    OnlyAttributes,
    BothElementsAndAttributes,
}

impl AppliesTo {
    pub fn elements(self) -> bool {
        matches!(self, AppliesTo::OnlyElements | AppliesTo::BothElementsAndAttributes)
    }

    pub fn attributes(self) -> bool {
        matches!(self, AppliesTo::OnlyAttributes | AppliesTo::BothElementsAndAttributes)
    }
}

/// Whether, and how, sibling positions are emitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IndexMode {
    #[default]
    None,
    /// Position among all siblings.
    Global,
    /// Position among siblings of the same type.
    PerType,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Identity {
    BlankNodes,
    /// `namespace` followed by a random UUID.
    Generated { namespace: String },
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
pub enum ConfigError {
    #[display("Invalid IRI `{iri}`")]
    InvalidIri {
        source: oxiri::IriParseError,
        iri: String,
    },

    #[display("Invalid local name `{name}`")]
    InvalidLocalName { name: String },

    #[display(
        "<{element_type}> has both an explicit datatype and a value-to-resource mapping"
    )]
    DatatypeAndValueMapping { element_type: String },

    #[display("Composite identifier for <{element_type}> has no mapping function")]
    MissingCompositeMapping { element_type: String },

    #[display("A composite identifier for <{element_type}> is already registered")]
    DuplicateCompositeId { element_type: String },

    #[display("Composite identifier for <{element_type}> requires `{name}` more than once")]
    DuplicateCompositeName { element_type: String, name: String },

    #[display("A rename path must name at least one element")]
    EmptyRenamePath,

    #[display("The queue capacity must be at least 1")]
    ZeroQueueCapacity,
}

struct IdFromAttribute {
    element_type: Option<String>,
    attribute: String,
    transform: StringTransform,
}

struct InvertRule {
    predicate: Option<String>,
    parent: Option<String>,
    child: Option<String>,
}

impl InvertRule {
    fn matches(&self, predicate: &str, parent: &str, child: &str) -> bool {
        self.predicate.as_deref().is_none_or(|p| p == predicate)
            && self.parent.as_deref().is_none_or(|p| p == parent)
            && self.child.as_deref().is_none_or(|c| c == child)
    }
}

type PairKey = (Option<String>, Option<String>);

/// Immutable conversion rules.
pub struct Config {
    override_namespace: Option<(String, AppliesTo)>,
    base_namespace: Option<(String, AppliesTo)>,
    namespace_suffix: Option<String>,
    element_renames: PathTrie,
    computed_renames: HashMap<String, StringTransform>,
    attribute_renames: HashMap<String, String>,
    type_override_attribute: Option<String>,
    identity: Identity,
    ids_from_attributes: Vec<IdFromAttribute>,
    index: IndexMode,
    auto_literals: bool,
    shallow: bool,
    elements_as_predicates: HashSet<String>,
    inserted_predicates: HashMap<PairKey, NamedNode>,
    inverted_predicates: Vec<InvertRule>,
    datatypes: HashMap<String, NamedNode>,
    value_mappings: HashMap<String, StringTransform>,
    auto_type_literals: bool,
    composite_ids: HashMap<String, Arc<CompositeIdRule>>,
    delayed: HashMap<String, DelayedTransform>,
    skipped: HashSet<String>,
    forced_mixed_content: HashSet<String>,
    qname_attributes: HashSet<String>,
    attribute_transforms: HashMap<PairKey, StringTransform>,
    queue_capacity: usize,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("override_namespace", &self.override_namespace)
            .field("base_namespace", &self.base_namespace)
            .field("namespace_suffix", &self.namespace_suffix)
            .field("identity", &self.identity)
            .field("index", &self.index)
            .field("auto_literals", &self.auto_literals)
            .field("shallow", &self.shallow)
            .field("auto_type_literals", &self.auto_type_literals)
            .field("queue_capacity", &self.queue_capacity)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            override_namespace: None,
            base_namespace: None,
            namespace_suffix: None,
            element_renames: PathTrie::default(),
            computed_renames: HashMap::new(),
            attribute_renames: HashMap::new(),
            type_override_attribute: None,
            identity: Identity::BlankNodes,
            ids_from_attributes: Vec::new(),
            index: IndexMode::None,
            auto_literals: false,
            shallow: false,
            elements_as_predicates: HashSet::new(),
            inserted_predicates: HashMap::new(),
            inverted_predicates: Vec::new(),
            datatypes: HashMap::new(),
            value_mappings: HashMap::new(),
            auto_type_literals: false,
            composite_ids: HashMap::new(),
            delayed: HashMap::new(),
            skipped: HashSet::new(),
            forced_mixed_content: HashSet::new(),
            qname_attributes: HashSet::new(),
            attribute_transforms: HashMap::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub(crate) fn override_namespace(&self) -> Option<(&str, AppliesTo)> {
        self.override_namespace
            .as_ref()
            .map(|(ns, applies_to)| (ns.as_str(), *applies_to))
    }

    pub(crate) fn base_namespace(&self) -> Option<(&str, AppliesTo)> {
        self.base_namespace
            .as_ref()
            .map(|(ns, applies_to)| (ns.as_str(), *applies_to))
    }

    /// Appends the configured suffix unless the namespace already ends in a
    /// separator.
    pub(crate) fn normalize_namespace(&self, namespace: String) -> String {
        match &self.namespace_suffix {
            Some(suffix)
                if !namespace.is_empty()
                    && !namespace.ends_with('/')
                    && !namespace.ends_with('#')
                    && !namespace.ends_with(suffix.as_str()) =>
            {
                namespace + suffix
            }
            _ => namespace,
        }
    }

    /// Resolves a rename for `element_type`, given the resolved types of the
    /// open ancestors, nearest first.
    pub(crate) fn rename_element<'a>(
        &'a self,
        element_type: &str,
        ancestors: impl IntoIterator<Item = &'a str>,
    ) -> Option<String> {
        if !self.element_renames.is_empty() {
            if let Some(target) = self.element_renames.lookup(element_type, ancestors) {
                return Some(target.to_string());
            }
        }

        self.computed_renames
            .get(element_type)
            .map(|rename| rename(element_type))
    }

    pub(crate) fn rename_attribute(&self, attribute: &str) -> Option<&str> {
        self.attribute_renames.get(attribute).map(String::as_str)
    }

    pub(crate) fn type_override_attribute(&self) -> Option<&str> {
        self.type_override_attribute.as_deref()
    }

    pub(crate) fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The most specific rule deriving the element id from this attribute.
    pub(crate) fn id_from_attribute(
        &self,
        element_type: &str,
        attribute: &str,
    ) -> Option<&StringTransform> {
        let mut global = None;
        for rule in self.ids_from_attributes.iter().filter(|r| r.attribute == attribute) {
            match rule.element_type.as_deref() {
                Some(t) if t == element_type => return Some(&rule.transform),
                None if global.is_none() => global = Some(&rule.transform),
                _ => {}
            }
        }
        global
    }

    pub(crate) fn index(&self) -> IndexMode {
        self.index
    }

    pub(crate) fn auto_literals(&self) -> bool {
        self.auto_literals
    }

    pub(crate) fn shallow(&self) -> bool {
        self.shallow
    }

    pub(crate) fn use_as_predicate(&self, element_type: &str) -> bool {
        self.elements_as_predicates.contains(element_type)
    }

    /// The predicate linking a parent to a child, most specific rule first:
    /// both types, then the child type, then the parent type, then any.
    pub(crate) fn inserted_predicate(&self, parent: &str, child: &str) -> Option<&NamedNode> {
        let key = |p: Option<&str>, c: Option<&str>| (p.map(str::to_string), c.map(str::to_string));
        if self.inserted_predicates.is_empty() {
            return None;
        }

        self.inserted_predicates
            .get(&key(Some(parent), Some(child)))
            .or_else(|| self.inserted_predicates.get(&key(None, Some(child))))
            .or_else(|| self.inserted_predicates.get(&key(Some(parent), None)))
            .or_else(|| self.inserted_predicates.get(&key(None, None)))
    }

    pub(crate) fn is_inverted(&self, predicate: &str, parent: &str, child: &str) -> bool {
        self.inverted_predicates
            .iter()
            .any(|rule| rule.matches(predicate, parent, child))
    }

    pub(crate) fn datatype(&self, predicate: &str) -> Option<&NamedNode> {
        self.datatypes.get(predicate)
    }

    pub(crate) fn value_mapping(&self, element_type: &str) -> Option<&StringTransform> {
        self.value_mappings.get(element_type)
    }

    pub(crate) fn auto_type_literals(&self) -> bool {
        self.auto_type_literals
    }

    pub(crate) fn composite_id(&self, element_type: &str) -> Option<&Arc<CompositeIdRule>> {
        self.composite_ids.get(element_type)
    }

    pub(crate) fn delayed(&self, element_type: &str) -> Option<&DelayedTransform> {
        self.delayed.get(element_type)
    }

    pub(crate) fn is_skipped(&self, element_type: &str) -> bool {
        self.skipped.contains(element_type)
    }

    pub(crate) fn forces_mixed_content(&self, element_type: &str) -> bool {
        self.forced_mixed_content.contains(element_type)
    }

    pub(crate) fn resolves_qname(&self, attribute: &str) -> bool {
        self.qname_attributes.contains(attribute)
    }

    /// The most specific value transform: element and attribute, element
    /// only, attribute only, then global.
    pub(crate) fn attribute_transform(
        &self,
        element_type: &str,
        attribute: &str,
    ) -> Option<&StringTransform> {
        if self.attribute_transforms.is_empty() {
            return None;
        }

        let e = Some(element_type.to_string());
        let a = Some(attribute.to_string());
        self.attribute_transforms
            .get(&(e.clone(), a.clone()))
            .or_else(|| self.attribute_transforms.get(&(e, None)))
            .or_else(|| self.attribute_transforms.get(&(None, a)))
            .or_else(|| self.attribute_transforms.get(&(None, None)))
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }
}

/// Collects rules; [`ConfigBuilder::build`] validates them.
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
    rename_paths: Vec<(Vec<String>, String)>,
    inserted_predicates: Vec<(String, Option<String>, Option<String>)>,
    datatypes: Vec<(String, String)>,
    composite_ids: Vec<CompositeIdRule>,
}

impl ConfigBuilder {
    /// Replaces the namespace of every element and/or attribute.
    pub fn override_namespace(mut self, namespace: impl Into<String>, applies_to: AppliesTo) -> Self {
        self.config.override_namespace = Some((namespace.into(), applies_to));
        self
    }

    /// Namespace for names that have none.
    pub fn base_namespace(mut self, namespace: impl Into<String>, applies_to: AppliesTo) -> Self {
        self.config.base_namespace = Some((namespace.into(), applies_to));
        self
    }

    /// Appends `suffix` (typically `#` or `/`) to namespaces lacking a
    /// separator at the end.
    pub fn auto_add_namespace_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.namespace_suffix = Some(suffix.into());
        self
    }

    pub fn rename_element(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rename_element_path([from.into()], to)
    }

    /// Renames the last element of `path` when its open ancestors match the
    /// rest of the path, outermost first.
    pub fn rename_element_path<I, S>(mut self, path: I, to: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rename_paths
            .push((path.into_iter().map(Into::into).collect(), to.into()));
        self
    }

    /// Computes the new type of `from` elements.
    pub fn rename_element_with<F>(mut self, from: impl Into<String>, rename: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.config
            .computed_renames
            .insert(from.into(), Arc::new(rename));
        self
    }

    pub fn rename_attribute(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.config
            .attribute_renames
            .insert(from.into(), to.into());
        self
    }

    /// Takes the element type from this attribute (a QName) when present.
    pub fn type_override_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.config.type_override_attribute = Some(attribute.into());
        self
    }

    /// Identifies nodes by `namespace` plus a random UUID instead of blank
    /// nodes.
    pub fn generated_ids(mut self, namespace: impl Into<String>) -> Self {
        self.config.identity = Identity::Generated {
            namespace: namespace.into(),
        };
        self
    }

    /// Derives the id of elements (of `element_type`, or any element) from an
    /// attribute value.
    pub fn use_attribute_for_id<F>(
        mut self,
        element_type: Option<&str>,
        attribute: impl Into<String>,
        transform: F,
    ) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.config.ids_from_attributes.push(IdFromAttribute {
            element_type: element_type.map(str::to_string),
            attribute: attribute.into(),
            transform: Arc::new(transform),
        });
        self
    }

    pub fn index(mut self, mode: IndexMode) -> Self {
        self.config.index = mode;
        self
    }

    /// Collapses text-only elements into literal properties of their parent.
    pub fn auto_detect_literal_properties(mut self) -> Self {
        self.config.auto_literals = true;
        self
    }

    /// Links elements whose children are all literal or shallow with their own
    /// type as predicate.
    pub fn convert_shallow_to_properties(mut self) -> Self {
        self.config.shallow = true;
        self
    }

    pub fn shallow_with_auto_literals(self) -> Self {
        self.convert_shallow_to_properties()
            .auto_detect_literal_properties()
    }

    pub fn use_element_as_predicate(mut self, element_type: impl Into<String>) -> Self {
        self.config
            .elements_as_predicates
            .insert(element_type.into());
        self
    }

    /// Links `parent` and `child` elements with `predicate`; `None` matches any
    /// type.
    pub fn insert_predicate(
        mut self,
        predicate: impl Into<String>,
        parent: Option<&str>,
        child: Option<&str>,
    ) -> Self {
        self.inserted_predicates.push((
            predicate.into(),
            parent.map(str::to_string),
            child.map(str::to_string),
        ));
        self
    }

    /// Swaps subject and object of matching parent-child links; `None`
    /// matches anything.
    pub fn invert_predicate(
        mut self,
        predicate: Option<&str>,
        parent: Option<&str>,
        child: Option<&str>,
    ) -> Self {
        self.config.inverted_predicates.push(InvertRule {
            predicate: predicate.map(str::to_string),
            parent: parent.map(str::to_string),
            child: child.map(str::to_string),
        });
        self
    }

    /// Datatype for literals emitted with this predicate (element type or
    /// attribute IRI).
    pub fn datatype(mut self, predicate: impl Into<String>, datatype: impl Into<String>) -> Self {
        self.datatypes.push((predicate.into(), datatype.into()));
        self
    }

    /// Emits the text of `element_type` elements as a resource computed from
    /// it.
    pub fn map_value_to_resource<F>(mut self, element_type: impl Into<String>, mapping: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.config
            .value_mappings
            .insert(element_type.into(), Arc::new(mapping));
        self
    }

    /// Infers integer, decimal, dateTime and date literals.
    pub fn auto_type_literals(mut self) -> Self {
        self.config.auto_type_literals = true;
        self
    }

    pub fn composite_id(mut self, rule: CompositeIdRule) -> Self {
        self.composite_ids.push(rule);
        self
    }

    /// Synthesizes extra elements when an element of `element_type` closes.
    pub fn delayed_elements<F>(mut self, element_type: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&ClosedElement<'_>) -> Vec<SyntheticElement> + Send + Sync + 'static,
    {
        self.config
            .delayed
            .insert(element_type.into(), Arc::new(transform));
        self
    }

    /// Ignores elements of this type together with their subtree.
    pub fn skip_element(mut self, element_type: impl Into<String>) -> Self {
        self.config.skipped.insert(element_type.into());
        self
    }

    pub fn force_mixed_content(mut self, element_type: impl Into<String>) -> Self {
        self.config
            .forced_mixed_content
            .insert(element_type.into());
        self
    }

    /// Expands this attribute's value as a QName and emits it as a resource.
    pub fn resolve_qname_in_attribute_value(mut self, attribute: impl Into<String>) -> Self {
        self.config.qname_attributes.insert(attribute.into());
        self
    }

    /// Rewrites attribute values; `None` matches any element or attribute.
    pub fn transform_attribute_value<F>(
        mut self,
        element_type: Option<&str>,
        attribute: Option<&str>,
        transform: F,
    ) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.config.attribute_transforms.insert(
            (element_type.map(str::to_string), attribute.map(str::to_string)),
            Arc::new(transform),
        );
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let ConfigBuilder {
            mut config,
            rename_paths,
            inserted_predicates,
            datatypes,
            composite_ids,
        } = self;

        for namespace in [
            config.override_namespace.as_ref().map(|(ns, _)| ns),
            config.base_namespace.as_ref().map(|(ns, _)| ns),
            match &config.identity {
                Identity::Generated { namespace } => Some(namespace),
                Identity::BlankNodes => None,
            },
        ]
        .into_iter()
        .flatten()
        {
            validate_iri(namespace)?;
        }

        for (path, to) in rename_paths {
            let path = Vec1::try_from_vec(path).map_err(|_| ConfigError::EmptyRenamePath)?;
            validate_iri(&to)?;
            config.element_renames.insert(path, to);
        }

        for (predicate, parent, child) in inserted_predicates {
            config
                .inserted_predicates
                .insert((parent, child), named_node(predicate)?);
        }

        for (predicate, datatype) in datatypes {
            if config.value_mappings.contains_key(&predicate) {
                return Err(ConfigError::DatatypeAndValueMapping {
                    element_type: predicate,
                });
            }
            config.datatypes.insert(predicate, named_node(datatype)?);
        }

        for rule in composite_ids {
            if rule.mapping.is_none() {
                return Err(ConfigError::MissingCompositeMapping {
                    element_type: rule.element_type,
                });
            }
            if let Some(name) = rule
                .local_names()
                .find(|name| rxml_validation::validate_ncname(name).is_err())
            {
                return Err(ConfigError::InvalidLocalName {
                    name: name.to_string(),
                });
            }
            if let Some(name) = duplicate_composite_name(&rule) {
                return Err(ConfigError::DuplicateCompositeName {
                    name: name.to_string(),
                    element_type: rule.element_type.clone(),
                });
            }
            if config.composite_ids.contains_key(&rule.element_type) {
                return Err(ConfigError::DuplicateCompositeId {
                    element_type: rule.element_type,
                });
            }
            config
                .composite_ids
                .insert(rule.element_type.clone(), Arc::new(rule));
        }

        if config.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }

        tracing::debug!(?config, "configuration built");
        Ok(config)
    }
}

/// Element names and ancestor aliases share one map, attributes have their
/// own; a name repeated within either could never be filled twice.
fn duplicate_composite_name(rule: &CompositeIdRule) -> Option<&str> {
    let mut element_names = HashSet::new();
    let mut attribute_names = HashSet::new();
    rule.elements
        .iter()
        .chain(rule.ancestors.iter().map(|a| &a.alias))
        .find(|&name| !element_names.insert(name.as_str()))
        .or_else(|| rule.attributes.iter().find(|&name| !attribute_names.insert(name.as_str())))
        .map(String::as_str)
}

fn validate_iri(iri: &str) -> Result<(), ConfigError> {
    Iri::parse(iri).map_err(|source| ConfigError::InvalidIri {
        source,
        iri: iri.to_string(),
    })?;
    Ok(())
}

fn named_node(iri: String) -> Result<NamedNode, ConfigError> {
    validate_iri(&iri)?;
    Ok(NamedNode::new_unchecked(iri))
}
