pub(crate) mod merge_policy;
